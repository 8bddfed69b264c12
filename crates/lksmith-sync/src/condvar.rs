//! Validated condition variable.

use std::time::Duration;

use lksmith::{HeldState, LockError};
use parking_lot::Condvar;

use crate::mutex::TrackedMutexGuard;

/// A `parking_lot::Condvar` whose waits are checked against the validator:
/// suspending requires actually holding the paired mutex.
///
/// The typed guard API makes an unpaired wait hard to express, but the check
/// runs regardless — it is the same verdict the validator gives a host that
/// drives `check_locked` by hand.
#[derive(Default)]
pub struct TrackedCondvar {
    inner: Condvar,
}

impl TrackedCondvar {
    pub const fn new() -> Self {
        Self {
            inner: Condvar::new(),
        }
    }

    /// Block until notified. Refused with `NotPermitted` if the calling
    /// thread does not hold the guarded mutex.
    pub fn wait<T>(&self, guard: &mut TrackedMutexGuard<'_, T>) -> Result<(), LockError> {
        match lksmith::check_locked(guard.token())? {
            HeldState::Held => {
                self.inner.wait(guard.parking_lot_guard());
                Ok(())
            }
            HeldState::NotHeld => Err(LockError::NotPermitted),
        }
    }

    /// Block until notified or until `timeout` elapses. Returns whether the
    /// wait timed out.
    pub fn wait_for<T>(
        &self,
        guard: &mut TrackedMutexGuard<'_, T>,
        timeout: Duration,
    ) -> Result<bool, LockError> {
        match lksmith::check_locked(guard.token())? {
            HeldState::Held => {
                let result = self.inner.wait_for(guard.parking_lot_guard(), timeout);
                Ok(result.timed_out())
            }
            HeldState::NotHeld => Err(LockError::NotPermitted),
        }
    }

    pub fn notify_one(&self) -> bool {
        self.inner.notify_one()
    }

    pub fn notify_all(&self) -> usize {
        self.inner.notify_all()
    }
}
