//! SSH transport wiring
//!
//! Configures the russh client engine, routes its host-key callback through
//! the trust store, and authenticates with a password captured from the
//! controlling terminal.

use std::borrow::Cow;
use std::io;
use std::sync::{Arc, Mutex};

use russh::client::{self, AuthResult, Handle, Handler};
use russh::keys::PublicKey;
use russh::{Channel, Preferred};
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::ssh::known_hosts::{self, TrustDecision, TrustStore};
use crate::terminal::{raw, CredentialPrompt};

/// Where the handler records the verification outcome so the connect path
/// can name the precise failure after the engine reports a generic one.
pub type DecisionSlot = Arc<Mutex<Option<TrustDecision>>>;

/// russh event handler: the engine hands us the server key during key
/// exchange and the trust store decides whether the handshake may proceed.
pub struct ClientHandler {
    store: TrustStore,
    interactive: bool,
    decision: DecisionSlot,
}

impl ClientHandler {
    #[must_use]
    pub fn new(store: TrustStore, interactive: bool, decision: DecisionSlot) -> Self {
        Self {
            store,
            interactive,
            decision,
        }
    }
}

impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = known_hosts::fingerprint(server_public_key);
        debug!(fingerprint = %fingerprint, algorithm = %server_public_key.algorithm(), "server key presented");

        let decision = match self.store.verify(&fingerprint, self.interactive).await {
            Ok(decision) => decision,
            Err(e) => {
                // An unreadable or corrupt store verifies nothing
                eprintln!("{e}");
                error!(error = %e, "trust store unavailable, failing closed");
                TrustDecision::Rejected
            }
        };

        if let Ok(mut slot) = self.decision.lock() {
            *slot = Some(decision);
        }
        Ok(decision.allows_connection())
    }
}

/// A connected, authenticated SSH transport.
pub struct SshClient {
    handle: Handle<ClientHandler>,
    host: String,
}

impl SshClient {
    /// Connect and verify the remote identity.
    ///
    /// # Errors
    ///
    /// Returns the precise verification failure when the handshake was
    /// stopped by the trust decision, or a connection error otherwise.
    pub async fn connect(config: &ClientConfig, decision: DecisionSlot) -> Result<Self> {
        let ssh_config = client::Config {
            preferred: Preferred {
                kex: Cow::Borrowed(&[
                    russh::kex::CURVE25519,
                    russh::kex::CURVE25519_PRE_RFC_8731,
                    russh::kex::ECDH_SHA2_NISTP256,
                    russh::kex::ECDH_SHA2_NISTP384,
                    russh::kex::ECDH_SHA2_NISTP521,
                    russh::kex::DH_G16_SHA512,
                    russh::kex::DH_G14_SHA256,
                    russh::kex::DH_GEX_SHA256,
                    russh::kex::DH_G14_SHA1,
                    russh::kex::DH_G1_SHA1,
                ]),
                ..Preferred::default()
            },
            ..client::Config::default()
        };

        let handler = ClientHandler::new(
            TrustStore::for_config(config),
            raw::is_tty(raw::stdin_fd()),
            Arc::clone(&decision),
        );

        let addr = format!("{}:{}", config.host, config.port);
        info!(addr = %addr, user = %config.user, "connecting");

        let handle = client::connect(Arc::new(ssh_config), addr.as_str(), handler)
            .await
            .map_err(|e| map_handshake_error(config, &decision, &e))?;

        Ok(Self {
            handle,
            host: config.host.clone(),
        })
    }

    /// Authenticate with a password read from the controlling terminal.
    ///
    /// The capture loop performs deliberate blocking reads, so it runs on a
    /// blocking thread while this task waits.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::CredentialUnavailable`] when no terminal is
    /// available to ask, or [`ClientError::Auth`] when the server refuses
    /// the credential.
    pub async fn authenticate(&mut self, config: &ClientConfig) -> Result<()> {
        let prompt = CredentialPrompt::new(config);
        let secret = tokio::task::spawn_blocking(move || prompt.capture())
            .await
            .map_err(|e| ClientError::Io(io::Error::other(e)))??;

        let Some(password) = secret else {
            return Err(ClientError::CredentialUnavailable {
                user: config.user.clone(),
                host: config.host.clone(),
            });
        };

        let outcome = self
            .handle
            .authenticate_password(config.user.as_str(), password.as_str())
            .await?;

        match outcome {
            AuthResult::Success => {
                info!(user = %config.user, host = %config.host, "authenticated");
                Ok(())
            }
            AuthResult::Failure { .. } => Err(ClientError::Auth {
                user: config.user.clone(),
                host: config.host.clone(),
            }),
        }
    }

    /// Open the one session channel this client uses.
    ///
    /// # Errors
    ///
    /// Channel-open failure is unrecoverable; there is no retry.
    pub async fn open_session_channel(&self) -> Result<Channel<client::Msg>> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| ClientError::ChannelOpen {
                reason: e.to_string(),
            })
    }

    /// Close the outer transport. Best effort; the session is already over.
    pub async fn close(self) {
        if let Err(e) = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await
        {
            debug!(host = %self.host, error = %e, "disconnect after session close failed");
        }
    }
}

/// Name the precise cause of a failed handshake: if the trust store stopped
/// it, the recorded decision says why; otherwise surface the engine error.
fn map_handshake_error(
    config: &ClientConfig,
    decision: &DecisionSlot,
    source: &russh::Error,
) -> ClientError {
    let recorded = decision.lock().ok().and_then(|slot| *slot);
    match recorded {
        Some(TrustDecision::Rejected) => ClientError::HostKeyRejected {
            host: config.host.clone(),
            port: config.port,
        },
        Some(TrustDecision::AskedRejected) => ClientError::HostKeyDeclined {
            host: config.host.clone(),
            port: config.port,
        },
        Some(TrustDecision::RejectedNoTty) => ClientError::HostKeyUnknownNoTty {
            host: config.host.clone(),
            port: config.port,
        },
        _ => ClientError::Connection {
            host: config.host.clone(),
            port: config.port,
            reason: source.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PtyRequest;
    use std::path::PathBuf;

    fn test_config() -> ClientConfig {
        ClientConfig {
            host: "h".to_string(),
            port: 22,
            user: "u".to_string(),
            command: None,
            pty: PtyRequest::Auto,
            term: "xterm".to_string(),
            trust_store: PathBuf::from("/nonexistent/known_hosts.jsonl"),
        }
    }

    fn slot_with(decision: Option<TrustDecision>) -> DecisionSlot {
        Arc::new(Mutex::new(decision))
    }

    #[test]
    fn test_handshake_error_mismatch_is_named() {
        let err = map_handshake_error(
            &test_config(),
            &slot_with(Some(TrustDecision::Rejected)),
            &russh::Error::Disconnect,
        );
        assert!(matches!(err, ClientError::HostKeyRejected { port: 22, .. }));
    }

    #[test]
    fn test_handshake_error_declined_is_named() {
        let err = map_handshake_error(
            &test_config(),
            &slot_with(Some(TrustDecision::AskedRejected)),
            &russh::Error::Disconnect,
        );
        assert!(matches!(err, ClientError::HostKeyDeclined { .. }));
    }

    #[test]
    fn test_handshake_error_no_tty_is_named() {
        let err = map_handshake_error(
            &test_config(),
            &slot_with(Some(TrustDecision::RejectedNoTty)),
            &russh::Error::Disconnect,
        );
        assert!(matches!(err, ClientError::HostKeyUnknownNoTty { .. }));
    }

    #[test]
    fn test_handshake_error_without_decision_is_a_connection_error() {
        let err = map_handshake_error(&test_config(), &slot_with(None), &russh::Error::Disconnect);
        assert!(matches!(err, ClientError::Connection { .. }));
    }

    #[test]
    fn test_handshake_error_after_acceptance_is_a_connection_error() {
        // The handshake can still fail after the key was accepted; that is
        // not a verification failure
        let err = map_handshake_error(
            &test_config(),
            &slot_with(Some(TrustDecision::Accepted)),
            &russh::Error::Disconnect,
        );
        assert!(matches!(err, ClientError::Connection { .. }));
    }
}
