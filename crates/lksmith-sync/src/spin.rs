//! Validated spin lock.

use std::cell::UnsafeCell;
use std::hint::spin_loop;
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use lksmith::LockToken;

/// A busy-waiting lock that reports every operation to the validator.
///
/// Non-recursive non-sleeper: the validator counts it toward the calling
/// thread's spin-hold count, so acquiring a blocking lock while this one is
/// held raises the spin-then-sleep hazard.
pub struct TrackedSpinLock<T> {
    locked: AtomicBool,
    value: UnsafeCell<T>,
    registered: Once,
}

// Exclusive access to `value` is enforced by `locked`.
unsafe impl<T: Send> Send for TrackedSpinLock<T> {}
unsafe impl<T: Send> Sync for TrackedSpinLock<T> {}

impl<T> TrackedSpinLock<T> {
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
            registered: Once::new(),
        }
    }

    /// This lock's identity: the address of the lock word.
    pub fn token(&self) -> LockToken {
        LockToken::of(&self.locked)
    }

    fn register(&self) {
        self.registered.call_once(|| {
            let _ = lksmith::optional_init(self.token(), false, false);
        });
    }

    fn acquire_raw(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                spin_loop();
            }
        }
    }

    pub fn lock(&self) -> TrackedSpinLockGuard<'_, T> {
        self.register();
        let token = self.token();
        let _ = lksmith::prelock(token, false);
        self.acquire_raw();
        lksmith::postlock(token, true);
        TrackedSpinLockGuard { lock: self, token }
    }

    pub fn try_lock(&self) -> Option<TrackedSpinLockGuard<'_, T>> {
        self.register();
        let token = self.token();
        let _ = lksmith::prelock(token, false);
        let acquired = self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        lksmith::postlock(token, acquired);
        acquired.then_some(TrackedSpinLockGuard { lock: self, token })
    }
}

impl<T> Drop for TrackedSpinLock<T> {
    fn drop(&mut self) {
        if self.registered.is_completed() {
            let _ = lksmith::destroy(self.token());
        }
    }
}

impl<T: Default> Default for TrackedSpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

pub struct TrackedSpinLockGuard<'a, T> {
    lock: &'a TrackedSpinLock<T>,
    token: LockToken,
}

impl<T> std::ops::Deref for TrackedSpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        unsafe { &*self.lock.value.get() }
    }
}

impl<T> std::ops::DerefMut for TrackedSpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T> Drop for TrackedSpinLockGuard<'_, T> {
    fn drop(&mut self) {
        let proceed = lksmith::preunlock(self.token).is_ok();
        self.lock.locked.store(false, Ordering::Release);
        if proceed {
            lksmith::postunlock(self.token);
        }
    }
}
