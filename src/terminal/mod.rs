pub mod raw;
pub mod secret;

pub use raw::RawGuard;
pub use secret::{CredentialPrompt, SecretBuffer};
