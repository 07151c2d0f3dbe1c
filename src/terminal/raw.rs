//! Raw-mode terminal control
//!
//! The terminal device is owned exclusively, and mutually exclusively over
//! time, by whichever component currently holds a [`RawGuard`]: the
//! credential prompt while a secret is being captured, the session bridge
//! while a PTY session is live.

use std::io;

#[cfg(unix)]
pub use unix::{is_tty, stdin_fd, stdout_fd, window_size, RawGuard};

#[cfg(not(unix))]
pub use fallback::{is_tty, stdin_fd, stdout_fd, window_size, RawGuard};

#[cfg(unix)]
mod unix {
    use super::io;
    use std::os::fd::RawFd;

    #[must_use]
    pub const fn stdin_fd() -> RawFd {
        libc::STDIN_FILENO
    }

    #[must_use]
    pub const fn stdout_fd() -> RawFd {
        libc::STDOUT_FILENO
    }

    #[must_use]
    pub fn is_tty(fd: RawFd) -> bool {
        unsafe { libc::isatty(fd) == 1 }
    }

    /// Current terminal dimensions as `(cols, rows)`, with an 80x24 fallback
    /// when the descriptor has no window size.
    #[must_use]
    pub fn window_size(fd: RawFd) -> (u32, u32) {
        let mut size: libc::winsize = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut size) };
        if rc == 0 && size.ws_col > 0 && size.ws_row > 0 {
            (u32::from(size.ws_col), u32::from(size.ws_row))
        } else {
            (80, 24)
        }
    }

    /// Saved termios state for one descriptor, restored on drop.
    ///
    /// Raw mode here means input-raw: no echo, no canonical line editing,
    /// no local signal generation, no flow control. Output processing is
    /// left untouched so local diagnostics still render normally.
    pub struct RawGuard {
        fd: RawFd,
        saved: libc::termios,
        active: bool,
    }

    impl RawGuard {
        /// Switch `fd` to raw mode.
        ///
        /// # Errors
        ///
        /// Returns an error if the descriptor is not a terminal or the
        /// terminal attributes cannot be read or changed.
        pub fn enable(fd: RawFd) -> io::Result<Self> {
            let mut saved: libc::termios = unsafe { std::mem::zeroed() };
            if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
                return Err(io::Error::last_os_error());
            }

            let mut raw = saved;
            raw.c_iflag &= !(libc::BRKINT | libc::ICRNL | libc::INPCK | libc::ISTRIP | libc::IXON);
            raw.c_lflag &= !(libc::ECHO | libc::ICANON | libc::IEXTEN | libc::ISIG);
            raw.c_cc[libc::VMIN] = 1;
            raw.c_cc[libc::VTIME] = 0;

            if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self {
                fd,
                saved,
                active: true,
            })
        }

        /// Restore the saved terminal state. Idempotent.
        pub fn restore(&mut self) {
            if self.active {
                unsafe {
                    libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved);
                }
                self.active = false;
            }
        }
    }

    impl Drop for RawGuard {
        fn drop(&mut self) {
            self.restore();
        }
    }
}

#[cfg(not(unix))]
mod fallback {
    use super::io;

    pub type RawFd = i32;

    #[must_use]
    pub const fn stdin_fd() -> RawFd {
        0
    }

    #[must_use]
    pub const fn stdout_fd() -> RawFd {
        1
    }

    #[must_use]
    pub const fn is_tty(_fd: RawFd) -> bool {
        false
    }

    #[must_use]
    pub const fn window_size(_fd: RawFd) -> (u32, u32) {
        (80, 24)
    }

    pub struct RawGuard;

    impl RawGuard {
        pub fn enable(_fd: RawFd) -> io::Result<Self> {
            Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "raw terminal mode is not supported on this platform",
            ))
        }

        pub fn restore(&mut self) {}
    }
}
