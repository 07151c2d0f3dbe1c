use std::env;
use std::path::PathBuf;

use crate::cli::Cli;
use crate::error::{ClientError, Result};

/// File name of the trust store, under `~/.ssh`.
const TRUST_STORE_FILE: &str = "known_hosts.jsonl";

/// How strongly the user asked for a pseudo-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtyRequest {
    /// No explicit flag: a PTY for an interactive shell, none for a command
    Auto,
    /// `-T`: never allocate a PTY
    Never,
    /// `-t`, repeated n times
    Force(u8),
}

/// Immutable per-invocation configuration.
///
/// Built exactly once from the parsed CLI arguments and the environment,
/// then passed by reference into every component constructor.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Remote command argument vector; `None` means an interactive shell
    pub command: Option<Vec<String>>,
    pub pty: PtyRequest,
    /// Terminal type reported to the remote PTY
    pub term: String,
    /// Path of the persisted host-identity store
    pub trust_store: PathBuf,
}

impl ClientConfig {
    /// Resolve CLI arguments and environment into a configuration value.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Environment`] when no username or home
    /// directory can be resolved.
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let (dest_user, host) = split_destination(&cli.destination);

        // A user in the destination wins over -l, which wins over the environment
        let user = match dest_user.map(str::to_string).or(cli.login_name) {
            Some(user) => user,
            None => resolve_user()?,
        };

        let home = resolve_home()?;
        let trust_store = home.join(".ssh").join(TRUST_STORE_FILE);

        let command = if cli.command.is_empty() {
            None
        } else {
            Some(cli.command)
        };

        Ok(Self {
            host: host.to_string(),
            port: cli.port,
            user,
            command,
            pty: pty_request(cli.force_tty, cli.no_tty),
            term: env::var("TERM").unwrap_or_else(|_| "xterm".to_string()),
            trust_store,
        })
    }
}

/// Split a `[user@]host` destination on the last `@`.
fn split_destination(destination: &str) -> (Option<&str>, &str) {
    match destination.rsplit_once('@') {
        Some((user, host)) => (Some(user), host),
        None => (None, destination),
    }
}

const fn pty_request(force_tty: u8, no_tty: bool) -> PtyRequest {
    if no_tty {
        PtyRequest::Never
    } else if force_tty > 0 {
        PtyRequest::Force(force_tty)
    } else {
        PtyRequest::Auto
    }
}

fn resolve_user() -> Result<String> {
    env::var("USER")
        .or_else(|_| env::var("LOGNAME"))
        .map_err(|_| ClientError::Environment { name: "USER" })
}

fn resolve_home() -> Result<PathBuf> {
    env::var("HOME")
        .or_else(|_| env::var("PROFILE"))
        .map(PathBuf::from)
        .or_else(|_| dirs::home_dir().ok_or(ClientError::Environment { name: "HOME" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_destination_plain_host() {
        assert_eq!(split_destination("server"), (None, "server"));
    }

    #[test]
    fn test_split_destination_with_user() {
        assert_eq!(split_destination("admin@server"), (Some("admin"), "server"));
    }

    #[test]
    fn test_split_destination_last_at_wins() {
        // A user name may itself contain '@'
        assert_eq!(
            split_destination("user@corp@server"),
            (Some("user@corp"), "server")
        );
    }

    #[test]
    fn test_split_destination_empty_user() {
        assert_eq!(split_destination("@server"), (Some(""), "server"));
    }

    #[test]
    fn test_pty_request_auto_by_default() {
        assert_eq!(pty_request(0, false), PtyRequest::Auto);
    }

    #[test]
    fn test_pty_request_never_wins() {
        assert_eq!(pty_request(0, true), PtyRequest::Never);
    }

    #[test]
    fn test_pty_request_force_keeps_level() {
        assert_eq!(pty_request(1, false), PtyRequest::Force(1));
        assert_eq!(pty_request(3, false), PtyRequest::Force(3));
    }
}
