//! UIO error codes.

use core::fmt;
use std::io;

use nix::errno::Errno;

/// The type returned by UIO operations.
pub type UioResult<T = ()> = Result<T, UioError>;

/// Failure classes of the UIO surface.
///
/// Per-region mapping failures are deliberately not represented here: after
/// `open` they live in the per-slot mapping state, and `open` itself never
/// fails because one of several regions could not be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UioError {
    /// A precondition on the descriptor does not hold: `open` on an already
    /// open device, or channel I/O on a closed one.
    InvalidParam,
    /// A timed wait elapsed with no interrupt event.
    TimedOut,
    /// The event counter channel transferred this many bytes instead of its
    /// fixed 4-byte width.
    ShortTransfer(usize),
    /// An underlying system call failed; the OS error code is preserved.
    Sys(Errno),
}

impl fmt::Display for UioError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            UioError::InvalidParam => write!(f, "invalid argument"),
            UioError::TimedOut => write!(f, "wait timed out"),
            UioError::ShortTransfer(n) => {
                write!(f, "event counter transferred {} of 4 bytes", n)
            }
            UioError::Sys(errno) => write!(f, "{}", errno),
        }
    }
}

impl std::error::Error for UioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UioError::Sys(errno) => Some(errno),
            _ => None,
        }
    }
}

impl From<Errno> for UioError {
    fn from(errno: Errno) -> Self {
        UioError::Sys(errno)
    }
}

impl From<io::Error> for UioError {
    fn from(err: io::Error) -> Self {
        match err.raw_os_error() {
            Some(code) => UioError::Sys(Errno::from_i32(code)),
            None => UioError::Sys(Errno::EIO),
        }
    }
}
