use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    // Environment errors
    #[error("cannot resolve {name} from the environment")]
    Environment { name: &'static str },

    // Trust store errors
    #[error("failed to read trust store {path}: {source}")]
    TrustStoreIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed record in trust store {path}: {source}")]
    TrustStoreParse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    // Host key verification failures
    #[error("host key verification failed for {host}:{port}")]
    HostKeyRejected { host: String, port: u16 },

    #[error("host key for {host}:{port} was declined")]
    HostKeyDeclined { host: String, port: u16 },

    #[error("no terminal available to confirm the unknown host key for {host}:{port}")]
    HostKeyUnknownNoTty { host: String, port: u16 },

    // Transport errors
    #[error("connection to {host}:{port} failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("no terminal available to read a password for {user}@{host}")]
    CredentialUnavailable { user: String, host: String },

    #[error("authentication failed for {user}@{host}")]
    Auth { user: String, host: String },

    #[error("failed to open session channel: {reason}")]
    ChannelOpen { reason: String },

    #[error("SSH transport error: {0}")]
    Ssh(#[from] russh::Error),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;
