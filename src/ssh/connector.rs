//! Connection orchestration
//!
//! The composition point: verification, authentication, and the session
//! bridge are wired together here and nowhere else. The connection walks a
//! fixed sequence of named phases; every transition is observable in the
//! debug log.

use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::ssh::client::{DecisionSlot, SshClient};
use crate::ssh::session::SessionBridge;

/// Lifecycle of one connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Verifying,
    Authenticating,
    ChannelOpen,
    Streaming,
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connecting => "connecting",
            Self::Verifying => "verifying",
            Self::Authenticating => "authenticating",
            Self::ChannelOpen => "channel-open",
            Self::Streaming => "streaming",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

pub struct Connector {
    config: ClientConfig,
    phase: Phase,
}

impl Connector {
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            phase: Phase::Connecting,
        }
    }

    fn advance(&mut self, next: Phase) {
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }

    /// Connect, verify, authenticate, and bridge one session.
    ///
    /// Returns the exit code derived from the remote termination.
    ///
    /// # Errors
    ///
    /// Any verification, authentication, transport, or channel failure ends
    /// the attempt; nothing here retries.
    pub async fn run(mut self) -> Result<i32> {
        // The PTY decision is computed once, before the connection is made
        let bridge = SessionBridge::new(&self.config);
        debug!(pty = bridge.pty_requested(), "session parameters frozen");

        // The engine calls back into the trust store during the handshake;
        // connect() returning means verification completed with acceptance
        let decision: DecisionSlot = Arc::new(Mutex::new(None));
        self.advance(Phase::Verifying);
        let mut client = SshClient::connect(&self.config, Arc::clone(&decision)).await?;

        self.advance(Phase::Authenticating);
        client.authenticate(&self.config).await?;

        self.advance(Phase::ChannelOpen);
        let session = bridge.open(client).await?;

        self.advance(Phase::Streaming);
        let code = session.stream().await?;

        self.advance(Phase::Closed);
        Ok(code)
    }
}
