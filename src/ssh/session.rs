//! Interactive session bridge
//!
//! Opens one shell or exec channel on a connected transport, bridges it to
//! the local terminal until the remote side closes it, and derives the
//! local exit code from the remote termination status. The lifecycle is a
//! pair of states: a configured [`SessionBridge`] becomes an
//! [`OpenSession`] once the channel is up, and an [`OpenSession`] streams
//! to completion exactly once.

use russh::client::Msg;
use russh::{Channel, ChannelMsg, Sig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::{ClientConfig, PtyRequest};
use crate::error::{ClientError, Result};
use crate::ssh::client::SshClient;
use crate::terminal::raw::{self, RawGuard};

const STDIN_BUF_SIZE: usize = 8192;

/// PTY parameters recorded once, before the connection is made.
#[derive(Debug, Clone)]
pub struct PtyParams {
    pub cols: u32,
    pub rows: u32,
    pub term: String,
}

/// Remote termination as reported on the channel, delivered exactly once.
#[derive(Debug, Default)]
struct Termination {
    status: Option<u32>,
    signal: Option<Sig>,
}

/// Session parameters, frozen before the connection exists.
pub struct SessionBridge {
    /// Argument vector joined into one remote command; `None` is a shell
    command: Option<String>,
    pty: Option<PtyParams>,
}

impl SessionBridge {
    /// Compute the PTY policy and freeze the session parameters.
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        let command = config.command.as_ref().map(|argv| argv.join(" "));
        let pty = use_pty(
            config.pty,
            command.is_some(),
            raw::is_tty(raw::stdin_fd()),
        )
        .then(|| {
            let (cols, rows) = raw::window_size(raw::stdout_fd());
            PtyParams {
                cols,
                rows,
                term: config.term.clone(),
            }
        });
        Self { command, pty }
    }

    #[must_use]
    pub fn pty_requested(&self) -> bool {
        self.pty.is_some()
    }

    #[must_use]
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    /// Open the session channel: PTY request if the policy says so, then
    /// the shell or exec request. Consumes the bridge; the returned state
    /// is the only way to reach the streaming phase.
    ///
    /// # Errors
    ///
    /// Channel-open and PTY/shell/exec request failures are fatal; there is
    /// no retry. The terminal is restored before the error propagates.
    pub async fn open(self, client: SshClient) -> Result<OpenSession> {
        // Raw mode is entered before the channel opens so remote-bound
        // control sequences are never interpreted locally. The guard
        // restores the terminal if any request below fails.
        let raw_guard = match &self.pty {
            Some(_) => Some(RawGuard::enable(raw::stdin_fd())?),
            None => None,
        };

        let channel = client.open_session_channel().await?;

        if let Some(pty) = &self.pty {
            debug!(cols = pty.cols, rows = pty.rows, term = %pty.term, "requesting pty");
            channel
                .request_pty(true, &pty.term, pty.cols, pty.rows, 0, 0, &[])
                .await
                .map_err(|e| ClientError::ChannelOpen {
                    reason: format!("pty request failed: {e}"),
                })?;
        }

        match &self.command {
            Some(command) => {
                debug!(command = %command, "executing remote command");
                channel
                    .exec(true, command.as_str())
                    .await
                    .map_err(|e| ClientError::ChannelOpen {
                        reason: format!("exec request failed: {e}"),
                    })?;
            }
            None => {
                debug!("requesting interactive shell");
                channel
                    .request_shell(true)
                    .await
                    .map_err(|e| ClientError::ChannelOpen {
                        reason: format!("shell request failed: {e}"),
                    })?;
            }
        }

        Ok(OpenSession {
            client,
            channel,
            raw_guard,
        })
    }
}

/// A live session channel with its terminal state.
pub struct OpenSession {
    client: SshClient,
    channel: Channel<Msg>,
    raw_guard: Option<RawGuard>,
}

impl OpenSession {
    /// Stream until the remote closes the channel, then restore the
    /// terminal, close the transport, and return the derived exit code.
    ///
    /// # Errors
    ///
    /// Returns transport or local I/O failures from the stream loop; the
    /// terminal is restored either way.
    pub async fn stream(mut self) -> Result<i32> {
        let termination = bridge_streams(self.channel).await;

        if let Some(guard) = self.raw_guard.as_mut() {
            guard.restore();
        }
        self.client.close().await;

        let termination = termination?;
        let code = exit_code(termination.status, termination.signal.as_ref());
        info!(code, "session closed");
        Ok(code)
    }
}

/// The PTY decision: an explicit flag wins, otherwise a shell gets one and
/// a command does not, and no terminal on standard input means none at all.
fn use_pty(request: PtyRequest, has_command: bool, stdin_is_tty: bool) -> bool {
    let requested = match request {
        PtyRequest::Force(_) => true,
        PtyRequest::Never => false,
        PtyRequest::Auto => !has_command,
    };
    requested && stdin_is_tty
}

/// Run all three stream directions until the channel closes.
///
/// Data flows stdin -> remote, remote stdout -> stdout, remote stderr ->
/// stderr concurrently in one loop; the exit status and signal are latched
/// from whichever channel messages carry them.
async fn bridge_streams(mut channel: Channel<Msg>) -> Result<Termination> {
    let mut stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let mut buf = vec![0u8; STDIN_BUF_SIZE];
    let mut stdin_open = true;
    let mut termination = Termination::default();

    loop {
        tokio::select! {
            read = stdin.read(&mut buf), if stdin_open => match read {
                Ok(0) => {
                    stdin_open = false;
                    if let Err(e) = channel.eof().await {
                        debug!(error = %e, "channel eof after stdin close failed");
                    }
                }
                Ok(n) => channel.data(&buf[..n]).await.map_err(ClientError::Ssh)?,
                Err(e) => {
                    warn!(error = %e, "stdin read failed, closing remote input");
                    stdin_open = false;
                    if let Err(e) = channel.eof().await {
                        debug!(error = %e, "channel eof after stdin error failed");
                    }
                }
            },
            msg = channel.wait() => match msg {
                Some(ChannelMsg::Data { data }) => {
                    stdout.write_all(&data).await?;
                    stdout.flush().await?;
                }
                Some(ChannelMsg::ExtendedData { data, ext }) if ext == 1 => {
                    stderr.write_all(&data).await?;
                    stderr.flush().await?;
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    debug!(exit_status, "remote exit status");
                    termination.status = Some(exit_status);
                }
                Some(ChannelMsg::ExitSignal { signal_name, .. }) => {
                    debug!(signal = ?signal_name, "remote exit signal");
                    termination.signal = Some(signal_name);
                }
                // Status messages may arrive after Eof; keep draining until
                // the channel is fully closed
                Some(ChannelMsg::Eof) => {}
                Some(ChannelMsg::Close) | None => break,
                Some(_) => {}
            },
        }
    }

    Ok(termination)
}

/// Local exit code for a remote termination: `128 + signal` when the remote
/// process was killed by a signal, otherwise its raw exit status.
#[must_use]
pub fn exit_code(status: Option<u32>, signal: Option<&Sig>) -> i32 {
    match signal {
        Some(sig) => 128 + sig_number(sig),
        #[allow(clippy::cast_possible_wrap)]
        None => status.unwrap_or(0) as i32,
    }
}

/// Conventional Unix signal numbers for the names the protocol can carry.
fn sig_number(sig: &Sig) -> i32 {
    match sig {
        Sig::HUP => 1,
        Sig::INT => 2,
        Sig::QUIT => 3,
        Sig::ILL => 4,
        Sig::ABRT => 6,
        Sig::FPE => 8,
        Sig::KILL => 9,
        Sig::USR1 => 10,
        Sig::SEGV => 11,
        Sig::PIPE => 13,
        Sig::ALRM => 14,
        Sig::TERM => 15,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config(command: Option<Vec<String>>, pty: PtyRequest) -> ClientConfig {
        ClientConfig {
            host: "h".to_string(),
            port: 22,
            user: "u".to_string(),
            command,
            pty,
            term: "xterm".to_string(),
            trust_store: PathBuf::from("/nonexistent"),
        }
    }

    // ---- PTY policy ----

    #[test]
    fn test_pty_default_on_for_shell() {
        assert!(use_pty(PtyRequest::Auto, false, true));
    }

    #[test]
    fn test_pty_default_off_for_command() {
        assert!(!use_pty(PtyRequest::Auto, true, true));
    }

    #[test]
    fn test_pty_forced_on_for_command() {
        assert!(use_pty(PtyRequest::Force(1), true, true));
        assert!(use_pty(PtyRequest::Force(3), true, true));
    }

    #[test]
    fn test_pty_forced_off_for_shell() {
        assert!(!use_pty(PtyRequest::Never, false, true));
    }

    #[test]
    fn test_pty_off_without_terminal_regardless_of_request() {
        assert!(!use_pty(PtyRequest::Auto, false, false));
        assert!(!use_pty(PtyRequest::Force(1), false, false));
        assert!(!use_pty(PtyRequest::Force(5), true, false));
        assert!(!use_pty(PtyRequest::Never, false, false));
    }

    // ---- exit code mapping ----

    #[test]
    fn test_exit_code_kill_signal() {
        assert_eq!(exit_code(None, Some(&Sig::KILL)), 137);
    }

    #[test]
    fn test_exit_code_signal_wins_over_status() {
        assert_eq!(exit_code(Some(0), Some(&Sig::TERM)), 143);
    }

    #[test]
    fn test_exit_code_plain_success() {
        assert_eq!(exit_code(Some(0), None), 0);
    }

    #[test]
    fn test_exit_code_status_passes_through() {
        assert_eq!(exit_code(Some(42), None), 42);
        assert_eq!(exit_code(Some(1), None), 1);
        assert_eq!(exit_code(Some(127), None), 127);
    }

    #[test]
    fn test_exit_code_missing_status_is_success() {
        assert_eq!(exit_code(None, None), 0);
    }

    #[test]
    fn test_sig_numbers_follow_unix_convention() {
        assert_eq!(sig_number(&Sig::HUP), 1);
        assert_eq!(sig_number(&Sig::INT), 2);
        assert_eq!(sig_number(&Sig::KILL), 9);
        assert_eq!(sig_number(&Sig::SEGV), 11);
        assert_eq!(sig_number(&Sig::TERM), 15);
    }

    #[test]
    fn test_unknown_signal_maps_to_base_code() {
        assert_eq!(exit_code(None, Some(&Sig::Custom("WINCH".to_string()))), 128);
    }

    // ---- session parameters ----

    #[test]
    fn test_command_argv_joined_with_single_spaces() {
        let config = test_config(
            Some(vec!["ls".to_string(), "-l".to_string(), "/tmp".to_string()]),
            PtyRequest::Auto,
        );
        let bridge = SessionBridge::new(&config);
        assert_eq!(bridge.command(), Some("ls -l /tmp"));
        // Batch command without a forced PTY: none requested
        assert!(!bridge.pty_requested());
    }

    #[test]
    fn test_shell_session_has_no_command() {
        let config = test_config(None, PtyRequest::Never);
        let bridge = SessionBridge::new(&config);
        assert!(bridge.command().is_none());
        assert!(!bridge.pty_requested());
    }

    #[test]
    fn test_single_word_command() {
        let config = test_config(Some(vec!["uptime".to_string()]), PtyRequest::Auto);
        let bridge = SessionBridge::new(&config);
        assert_eq!(bridge.command(), Some("uptime"));
    }
}
