//! Validator error kinds.

use std::error::Error;
use std::fmt;

/// Why a validator operation failed, or what hazard a report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockError {
    /// An internal allocation failed.
    OutOfMemory,
    /// The lock is still held and the operation was refused.
    Busy,
    /// No record exists for the given token.
    NotFound,
    /// A record already exists for the given token.
    AlreadyExists,
    /// A deadlock is reachable: lock-order inversion or self-acquisition of a
    /// non-recursive lock.
    Deadlock,
    /// The calling thread does not hold the lock the operation requires.
    NotPermitted,
    /// Performance hazard: a blocking lock acquired while spinning.
    WouldBlock,
    /// Bookkeeping inconsistency inside the validator itself.
    Internal,
}

impl LockError {
    /// POSIX-style numeric code, for the C-compatible report callback.
    pub fn code(self) -> libc::c_int {
        match self {
            Self::OutOfMemory => libc::ENOMEM,
            Self::Busy => libc::EBUSY,
            Self::NotFound => libc::ENOENT,
            Self::AlreadyExists => libc::EEXIST,
            Self::Deadlock => libc::EDEADLK,
            Self::NotPermitted => libc::EPERM,
            Self::WouldBlock => libc::EAGAIN,
            Self::Internal => libc::EIO,
        }
    }
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::OutOfMemory => "out of memory",
            Self::Busy => "lock busy",
            Self::NotFound => "no such lock",
            Self::AlreadyExists => "lock already exists",
            Self::Deadlock => "deadlock risk",
            Self::NotPermitted => "operation not permitted",
            Self::WouldBlock => "performance hazard",
            Self::Internal => "internal error",
        };
        f.write_str(text)
    }
}

impl Error for LockError {}

/// Verdict of [`crate::check_locked`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeldState {
    /// The calling thread holds the lock.
    Held,
    /// The calling thread does not hold the lock; a condition wait paired
    /// with it must be refused.
    NotHeld,
}
