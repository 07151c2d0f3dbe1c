pub mod cli;
pub mod config;
pub mod error;
pub mod ssh;
pub mod terminal;

pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use ssh::{Connector, HostKeyRecord, SessionBridge, SshClient, TrustDecision, TrustStore};
pub use terminal::{CredentialPrompt, SecretBuffer};
