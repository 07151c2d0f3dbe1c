mod client;
mod connector;
pub mod known_hosts;
pub mod line_decoder;
pub mod session;

pub use client::{ClientHandler, SshClient};
pub use connector::Connector;
pub use known_hosts::{HostKeyRecord, TrustDecision, TrustStore};
pub use line_decoder::LineDecoder;
pub use session::{OpenSession, SessionBridge};
