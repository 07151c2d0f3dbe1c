//! Host-identity trust store
//!
//! Trust-on-first-use verification against a persistent, append-only store:
//! one JSON record per line, looked up by `(host, port, hash_type)` in file
//! order, first match wins. A changed fingerprint is rejected outright and
//! never prompts; an unknown host may be accepted interactively, which
//! appends a new record. Prior lines are history and are never rewritten.

use std::io::{self, Write};
use std::path::PathBuf;

use russh::keys::{HashAlg, PublicKey};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::ssh::line_decoder::LineDecoder;

/// Permission mode for a newly created store file: owner read/write,
/// group read only.
#[cfg(unix)]
const STORE_FILE_MODE: u32 = 0o640;

const READ_CHUNK_SIZE: usize = 4096;

/// One persisted trust entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostKeyRecord {
    pub host: String,
    pub port: u16,
    pub hash_type: String,
    pub fingerprint: String,
}

/// Outcome of one verification. Exactly one is produced per connection
/// attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustDecision {
    /// A stored record matched the presented fingerprint
    Accepted,
    /// A stored record exists but its fingerprint differs; never prompts
    Rejected,
    /// Unknown host, user affirmed the fingerprint
    AskedAccepted,
    /// Unknown host, user declined the fingerprint
    AskedRejected,
    /// Unknown host and no interactive input available to ask
    RejectedNoTty,
}

impl TrustDecision {
    /// Whether the transport may proceed past identity verification.
    #[must_use]
    pub const fn allows_connection(self) -> bool {
        matches!(self, Self::Accepted | Self::AskedAccepted)
    }
}

/// The fingerprint the engine presents for a server key, and the name of
/// the hash it was derived with.
#[must_use]
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

/// Hash name stored in records created by this client.
pub const FINGERPRINT_HASH: &str = "sha256";

/// Whether a free-form answer to the unknown-host question counts as an
/// affirmation.
#[must_use]
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim().to_lowercase();
    answer.starts_with("yes")
        || answer.starts_with("是")
        || answer.starts_with("好")
        || answer == "y"
        || answer == "可以"
}

/// Persistent host-identity store for one `(host, port, hash_type)` target.
#[derive(Debug)]
pub struct TrustStore {
    path: PathBuf,
    host: String,
    port: u16,
    hash_type: String,
}

impl TrustStore {
    #[must_use]
    pub fn new(path: PathBuf, host: String, port: u16, hash_type: String) -> Self {
        Self {
            path,
            host,
            port,
            hash_type,
        }
    }

    #[must_use]
    pub fn for_config(config: &ClientConfig) -> Self {
        Self::new(
            config.trust_store.clone(),
            config.host.clone(),
            config.port,
            FINGERPRINT_HASH.to_string(),
        )
    }

    /// Verify a presented fingerprint against the store.
    ///
    /// Side effect: appends a new record when the user affirms an unknown
    /// host. The append failing does not turn the affirmation into a
    /// rejection; it is reported and the decision stands.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::TrustStoreIo`] or
    /// [`ClientError::TrustStoreParse`] when the store cannot be read or
    /// holds a malformed record. Both are fatal to this verification; a
    /// store that cannot be trusted verifies nothing.
    pub async fn verify(&self, fingerprint: &str, interactive: bool) -> Result<TrustDecision> {
        let records = self.load().await?;

        if let Some(record) = self.lookup(&records) {
            if record.fingerprint == fingerprint {
                debug!(host = %self.host, port = self.port, "host key verified against trust store");
                return Ok(TrustDecision::Accepted);
            }
            eprintln!(
                "Warning: the host key {} fingerprint for the remote host {}:{} has changed from\n{} to {}.",
                self.hash_type, self.host, self.port, record.fingerprint, fingerprint
            );
            warn!(
                host = %self.host,
                port = self.port,
                stored = %record.fingerprint,
                presented = %fingerprint,
                "host key mismatch"
            );
            return Ok(TrustDecision::Rejected);
        }

        if !interactive {
            debug!(host = %self.host, port = self.port, "unknown host and no terminal to ask");
            return Ok(TrustDecision::RejectedNoTty);
        }

        let answer = self.ask(fingerprint).await?;
        if !is_affirmative(&answer) {
            return Ok(TrustDecision::AskedRejected);
        }

        match self.append(fingerprint).await {
            Ok(()) => eprintln!(
                "Added host {}:{} to the list of known hosts.",
                self.host, self.port
            ),
            Err(e) => eprintln!("{e}"),
        }
        Ok(TrustDecision::AskedAccepted)
    }

    /// Append one record for the presented fingerprint, creating the store
    /// (and its parent directory) with restrictive permissions if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or the file
    /// cannot be created or written.
    pub async fn append(&self, fingerprint: &str) -> Result<()> {
        let record = HostKeyRecord {
            host: self.host.clone(),
            port: self.port,
            hash_type: self.hash_type.clone(),
            fingerprint: fingerprint.to_string(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(STORE_FILE_MODE);

        let mut file = options
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        debug!(host = %self.host, port = self.port, "trust store record appended");
        Ok(())
    }

    /// Read every record, decoding lines incrementally as chunks arrive.
    /// A missing file is an empty store; any other failure is fatal.
    async fn load(&self) -> Result<Vec<HostKeyRecord>> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.io_error(e)),
        };

        let mut decoder = LineDecoder::new();
        let mut records = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let n = file.read(&mut chunk).await.map_err(|e| self.io_error(e))?;
            if n == 0 {
                break;
            }
            for line in decoder.feed(&chunk[..n]) {
                records.push(self.parse_record(&line)?);
            }
        }
        // The final record does not need a trailing delimiter
        if let Some(tail) = decoder.finish() {
            records.push(self.parse_record(&tail)?);
        }

        debug!(count = records.len(), path = %self.path.display(), "trust store loaded");
        Ok(records)
    }

    fn parse_record(&self, line: &[u8]) -> Result<HostKeyRecord> {
        serde_json::from_slice(line).map_err(|e| ClientError::TrustStoreParse {
            path: self.path.display().to_string(),
            source: e,
        })
    }

    /// First record matching this store's `(host, port, hash_type)` wins;
    /// later records for the same target are unread history.
    fn lookup<'a>(&self, records: &'a [HostKeyRecord]) -> Option<&'a HostKeyRecord> {
        records.iter().find(|r| {
            r.host == self.host && r.port == self.port && r.hash_type == self.hash_type
        })
    }

    /// Put the unknown-host question to the user and read one line.
    async fn ask(&self, fingerprint: &str) -> Result<String> {
        eprint!(
            "The host key {} fingerprint for {}:{} is {}, continue? ",
            self.hash_type, self.host, self.port, fingerprint
        );
        io::stderr().flush()?;

        let mut answer = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut answer)
            .await?;
        Ok(answer)
    }

    fn io_error(&self, source: io::Error) -> ClientError {
        ClientError::TrustStoreIo {
            path: self.path.display().to_string(),
            source,
        }
    }
}
