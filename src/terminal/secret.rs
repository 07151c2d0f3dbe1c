//! Password capture from the controlling terminal
//!
//! The prompt never echoes, never persists the secret, and never leaves the
//! terminal in raw mode: every exit path (terminator, error, interrupt)
//! restores the saved state first. An interrupt during capture terminates
//! the whole process rather than returning a half-captured secret.

use std::io::{self, Write};

use zeroize::Zeroizing;

use crate::config::ClientConfig;
use crate::terminal::raw;

/// Capture stops once this many bytes are buffered.
pub const MAX_SECRET_LEN: usize = 256;

const ETX: u8 = 0x03;
const BACKSPACE: u8 = 0x7f;

/// Outcome of feeding one input byte to a [`SecretBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    /// Keep reading
    Continue,
    /// A terminator was read or the buffer is full
    Done,
    /// The user interrupted the capture
    Abort,
}

/// The per-byte editing state machine behind the prompt, separated from
/// device I/O so the terminator, backspace, and size-cap rules are testable.
#[derive(Debug, Default)]
pub struct SecretBuffer {
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretBuffer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            bytes: Zeroizing::new(Vec::with_capacity(MAX_SECRET_LEN)),
        }
    }

    /// Apply one input byte.
    ///
    /// Carriage return and line feed terminate the capture; ETX aborts it;
    /// backspace removes the most recent byte, if any, and is never stored.
    pub fn push(&mut self, byte: u8) -> CaptureStep {
        match byte {
            b'\r' | b'\n' => CaptureStep::Done,
            ETX => CaptureStep::Abort,
            BACKSPACE => {
                self.bytes.pop();
                CaptureStep::Continue
            }
            _ => {
                self.bytes.push(byte);
                if self.bytes.len() >= MAX_SECRET_LEN {
                    CaptureStep::Done
                } else {
                    CaptureStep::Continue
                }
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Consume the buffer into the captured text.
    #[must_use]
    pub fn into_secret(self) -> Zeroizing<String> {
        Zeroizing::new(String::from_utf8_lossy(&self.bytes).into_owned())
    }
}

/// Reads a secret from the controlling terminal without echo.
///
/// Performs deliberate short blocking reads against the raw device; run it
/// on a blocking thread, before or beside the async transport, never on the
/// async scheduler itself.
pub struct CredentialPrompt {
    user: String,
    host: String,
    port: u16,
}

impl CredentialPrompt {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            user: config.user.clone(),
            host: config.host.clone(),
            port: config.port,
        }
    }

    /// Capture one secret.
    ///
    /// Returns `Ok(None)` when standard input is not a terminal; the caller
    /// must then fall back to another authentication source or fail.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be switched to raw mode or a
    /// device read fails for a reason other than a transient would-block.
    pub fn capture(&self) -> io::Result<Option<Zeroizing<String>>> {
        if !raw::is_tty(raw::stdin_fd()) {
            return Ok(None);
        }
        self.capture_from_device()
    }

    #[cfg(unix)]
    fn capture_from_device(&self) -> io::Result<Option<Zeroizing<String>>> {
        let mut guard = raw::RawGuard::enable(raw::stdin_fd())?;

        eprint!("Password for {}@{}:{}: ", self.user, self.host, self.port);
        io::stderr().flush()?;

        let mut fd = raw::stdin_fd();
        let mut reopened_tty: Option<i32> = None;
        let mut buffer = SecretBuffer::new();

        loop {
            let mut byte = [0u8; 1];
            let n = unsafe { libc::read(fd, byte.as_mut_ptr().cast(), 1) };

            if n == 0 {
                // EOF on the device counts as a terminator
                break;
            }
            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    // Standard input is redirected but a controlling
                    // terminal still exists: switch the input source to it
                    let tty = unsafe { libc::open(b"/dev/tty\0".as_ptr().cast(), libc::O_RDONLY) };
                    if tty < 0 {
                        let open_err = io::Error::last_os_error();
                        guard.restore();
                        return Err(open_err);
                    }
                    if let Some(previous) = reopened_tty.replace(tty) {
                        unsafe { libc::close(previous) };
                    }
                    fd = tty;
                    continue;
                }
                if let Some(tty) = reopened_tty.take() {
                    unsafe { libc::close(tty) };
                }
                guard.restore();
                return Err(err);
            }

            match buffer.push(byte[0]) {
                CaptureStep::Continue => {}
                CaptureStep::Done => break,
                CaptureStep::Abort => {
                    if let Some(tty) = reopened_tty.take() {
                        unsafe { libc::close(tty) };
                    }
                    guard.restore();
                    eprintln!();
                    // A secret must never be left half-captured with the
                    // terminal in an unknown state; this exit is the one
                    // cancellation path of the whole client.
                    std::process::exit(1);
                }
            }
        }

        if let Some(tty) = reopened_tty.take() {
            unsafe { libc::close(tty) };
        }
        guard.restore();
        eprintln!();

        Ok(Some(buffer.into_secret()))
    }

    #[cfg(not(unix))]
    fn capture_from_device(&self) -> io::Result<Option<Zeroizing<String>>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buffer: &mut SecretBuffer, bytes: &[u8]) -> CaptureStep {
        let mut last = CaptureStep::Continue;
        for &b in bytes {
            last = buffer.push(b);
            if last != CaptureStep::Continue {
                break;
            }
        }
        last
    }

    #[test]
    fn test_plain_capture() {
        let mut buffer = SecretBuffer::new();
        let step = feed(&mut buffer, b"secret\r");
        assert_eq!(step, CaptureStep::Done);
        assert_eq!(buffer.into_secret().as_str(), "secret");
    }

    #[test]
    fn test_line_feed_terminates() {
        let mut buffer = SecretBuffer::new();
        assert_eq!(feed(&mut buffer, b"pw\n"), CaptureStep::Done);
        assert_eq!(buffer.into_secret().as_str(), "pw");
    }

    #[test]
    fn test_backspace_removes_last_byte() {
        // p a s s <backspace> w o r d -> "pasword"
        let mut buffer = SecretBuffer::new();
        let step = feed(&mut buffer, &[b'p', b'a', b's', b's', BACKSPACE, b'w', b'o', b'r', b'd', b'\r']);
        assert_eq!(step, CaptureStep::Done);
        assert_eq!(buffer.into_secret().as_str(), "pasword");
    }

    #[test]
    fn test_backspace_on_empty_buffer() {
        let mut buffer = SecretBuffer::new();
        assert_eq!(buffer.push(BACKSPACE), CaptureStep::Continue);
        assert_eq!(buffer.push(BACKSPACE), CaptureStep::Continue);
        assert!(buffer.is_empty());
        assert_eq!(feed(&mut buffer, b"x\r"), CaptureStep::Done);
        assert_eq!(buffer.into_secret().as_str(), "x");
    }

    #[test]
    fn test_backspace_is_not_stored() {
        let mut buffer = SecretBuffer::new();
        buffer.push(b'a');
        buffer.push(BACKSPACE);
        buffer.push(BACKSPACE);
        buffer.push(b'b');
        assert_eq!(buffer.len(), 1);
        assert_eq!(buffer.into_secret().as_str(), "b");
    }

    #[test]
    fn test_interrupt_aborts() {
        let mut buffer = SecretBuffer::new();
        buffer.push(b'a');
        assert_eq!(buffer.push(ETX), CaptureStep::Abort);
    }

    #[test]
    fn test_capture_stops_at_limit() {
        let mut buffer = SecretBuffer::new();
        for i in 0..MAX_SECRET_LEN - 1 {
            assert_eq!(buffer.push(b'a'), CaptureStep::Continue, "byte {i}");
        }
        assert_eq!(buffer.push(b'a'), CaptureStep::Done);
        assert_eq!(buffer.len(), MAX_SECRET_LEN);
    }

    #[test]
    fn test_limit_never_exceeded_with_backspaces() {
        let mut buffer = SecretBuffer::new();
        for _ in 0..200 {
            buffer.push(b'a');
        }
        for _ in 0..100 {
            buffer.push(BACKSPACE);
        }
        for _ in 0..150 {
            buffer.push(b'b');
        }
        assert!(buffer.len() <= MAX_SECRET_LEN);
    }

    #[test]
    fn test_empty_secret_is_allowed() {
        let mut buffer = SecretBuffer::new();
        assert_eq!(buffer.push(b'\r'), CaptureStep::Done);
        assert_eq!(buffer.into_secret().as_str(), "");
    }

    #[test]
    fn test_non_utf8_bytes_are_replaced_not_dropped() {
        let mut buffer = SecretBuffer::new();
        buffer.push(0xff);
        buffer.push(b'a');
        let secret = buffer.into_secret();
        assert!(secret.as_str().ends_with('a'));
        assert!(!secret.as_str().is_empty());
    }
}
