use std::process;

use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

use remsh::cli::{verbosity_filter, Cli};
use remsh::config::ClientConfig;
use remsh::ssh::Connector;

/// Exit code for bad invocations, distinct from remote-derived codes.
const USAGE_EXIT: i32 = 255;

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => USAGE_EXIT,
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    if cli.protocol_1 {
        eprintln!("remsh: protocol version 1 is not supported");
        process::exit(1);
    }
    if cli.agent_forwarding {
        eprintln!("remsh: agent forwarding is currently not supported");
    }
    if cli.x11_forwarding {
        eprintln!("remsh: X11 forwarding is currently not supported");
    }

    // Logging goes to stderr; stdout belongs to the remote session
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(verbosity_filter(cli.verbose))),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match ClientConfig::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("remsh: {e}");
            process::exit(1);
        }
    };

    match Connector::new(config).run().await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("remsh: {e}");
            process::exit(1);
        }
    }
}
