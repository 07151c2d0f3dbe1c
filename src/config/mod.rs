mod types;

pub use types::{ClientConfig, PtyRequest};
