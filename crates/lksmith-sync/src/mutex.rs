//! Validated blocking mutex.

use std::mem::ManuallyDrop;
use std::sync::Once;

use lksmith::LockToken;
use parking_lot::{Mutex, MutexGuard};

/// A `parking_lot::Mutex` that reports every operation to the validator.
///
/// Non-recursive sleeper: re-acquiring it on the same thread is reported as
/// a deadlock hazard (and would in fact deadlock).
pub struct TrackedMutex<T> {
    inner: Mutex<T>,
    registered: Once,
}

impl<T> TrackedMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            registered: Once::new(),
        }
    }

    /// This lock's identity: the address of the underlying primitive.
    pub fn token(&self) -> LockToken {
        LockToken::of(&self.inner)
    }

    fn register(&self) {
        self.registered.call_once(|| {
            let _ = lksmith::optional_init(self.token(), false, true);
        });
    }

    pub fn lock(&self) -> TrackedMutexGuard<'_, T> {
        self.register();
        let token = self.token();
        // Advisory: a deadlock verdict was already reported; proceed anyway.
        let _ = lksmith::prelock(token, true);
        let guard = self.inner.lock();
        lksmith::postlock(token, true);
        TrackedMutexGuard {
            token,
            inner: ManuallyDrop::new(guard),
        }
    }

    pub fn try_lock(&self) -> Option<TrackedMutexGuard<'_, T>> {
        self.register();
        let token = self.token();
        let _ = lksmith::prelock(token, true);
        match self.inner.try_lock() {
            Some(guard) => {
                lksmith::postlock(token, true);
                Some(TrackedMutexGuard {
                    token,
                    inner: ManuallyDrop::new(guard),
                })
            }
            None => {
                lksmith::postlock(token, false);
                None
            }
        }
    }
}

impl<T> Drop for TrackedMutex<T> {
    fn drop(&mut self) {
        if self.registered.is_completed() {
            let _ = lksmith::destroy(self.token());
        }
    }
}

impl<T: Default> Default for TrackedMutex<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub struct TrackedMutexGuard<'a, T> {
    token: LockToken,
    inner: ManuallyDrop<MutexGuard<'a, T>>,
}

impl<'a, T> TrackedMutexGuard<'a, T> {
    pub fn token(&self) -> LockToken {
        self.token
    }

    pub(crate) fn parking_lot_guard(&mut self) -> &mut MutexGuard<'a, T> {
        &mut self.inner
    }
}

impl<T> std::ops::Deref for TrackedMutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> std::ops::DerefMut for TrackedMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.inner
    }
}

impl<T> Drop for TrackedMutexGuard<'_, T> {
    fn drop(&mut self) {
        let proceed = lksmith::preunlock(self.token).is_ok();
        unsafe { ManuallyDrop::drop(&mut self.inner) };
        if proceed {
            lksmith::postunlock(self.token);
        }
    }
}
