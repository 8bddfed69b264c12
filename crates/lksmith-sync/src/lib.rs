//! Lock primitives wired to the lksmith validation protocol.
//!
//! Each wrapper brackets its underlying primitive with
//! `prelock`/`postlock`/`preunlock`/`postunlock`, registers itself on first
//! acquisition, and retires its record on drop. The validator is advisory:
//! a hazard is reported (and surfaces in the prelock verdict) but the
//! acquisition itself proceeds, so instrumented programs keep their original
//! behavior.
//!
//! Identity is by address. A wrapper must stay where it is between its first
//! acquisition and its drop — give it a stable home (a `static`, an `Arc`,
//! a long-lived struct field) rather than moving it around.

mod condvar;
mod mutex;
mod spin;

pub use condvar::TrackedCondvar;
pub use mutex::{TrackedMutex, TrackedMutexGuard};
pub use spin::{TrackedSpinLock, TrackedSpinLockGuard};
