//! Command-line interface
//!
//! Argument parsing only; the parsed values are turned into one immutable
//! [`crate::config::ClientConfig`] before anything else runs.

use clap::{ArgAction, Parser};

/// remsh - interactive SSH remote-shell client
#[derive(Parser, Debug)]
#[command(name = "remsh")]
#[command(about = "Connect to a remote host and run an interactive shell or a command")]
#[command(version)]
#[command(after_help = "EXAMPLES:
    # Interactive shell on a remote host
    remsh admin@server.example.com

    # Run a single command (no PTY by default)
    remsh server.example.com uname -a

    # Non-default port, explicit login name
    remsh -p 2222 -l deploy server.example.com")]
pub struct Cli {
    /// Remote destination, as [user@]host
    pub destination: String,

    /// Command to execute remotely; an interactive shell when omitted
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Port to connect to on the remote host
    #[arg(short = 'p', long, default_value_t = 22)]
    pub port: u16,

    /// Login name on the remote host
    #[arg(short = 'l', long = "login-name")]
    pub login_name: Option<String>,

    /// Force pseudo-terminal allocation; repeat to raise the request level
    #[arg(short = 't', action = ArgAction::Count, conflicts_with = "no_tty")]
    pub force_tty: u8,

    /// Disable pseudo-terminal allocation
    #[arg(short = 'T')]
    pub no_tty: bool,

    /// Increase diagnostic verbosity; repeat for more detail
    #[arg(short = 'v', action = ArgAction::Count)]
    pub verbose: u8,

    /// Use protocol version 2 (the only supported version; accepted for compatibility)
    #[arg(short = '2', hide = true)]
    pub protocol_2: bool,

    /// Use protocol version 1 (not supported)
    #[arg(short = '1', hide = true)]
    pub protocol_1: bool,

    /// Disable agent forwarding (always disabled; accepted for compatibility)
    #[arg(short = 'a', hide = true)]
    pub no_agent_forwarding: bool,

    /// Enable agent forwarding (not supported)
    #[arg(short = 'A', hide = true)]
    pub agent_forwarding: bool,

    /// Disable X11 forwarding (always disabled; accepted for compatibility)
    #[arg(short = 'x', hide = true)]
    pub no_x11_forwarding: bool,

    /// Enable X11 forwarding (not supported)
    #[arg(short = 'X', hide = true)]
    pub x11_forwarding: bool,
}

/// Default `tracing` filter directive for a `-v` repetition count.
///
/// `RUST_LOG` takes precedence over this when set.
#[must_use]
pub const fn verbosity_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
