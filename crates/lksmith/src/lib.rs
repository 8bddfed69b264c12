//! Runtime lock-order validation for threaded programs.
//!
//! lksmith watches a process's lock traffic while it runs under real
//! workloads and reports conditions that could turn into deadlocks or
//! synchronization bugs: cyclic acquisition orders across threads,
//! self-recursion on a non-recursive lock, destruction of a held lock,
//! unlocking from the wrong thread, condition waits without the paired
//! mutex, and blocking acquisitions made while spinning. Problems are
//! reported — with the lock, the offending thread, and a symbolic
//! backtrace — and the program is allowed to continue.
//!
//! The host brackets every lock operation with the validation protocol:
//!
//! ```no_run
//! use lksmith::LockToken;
//!
//! let lock = Box::new(0u32); // stand-in for a real mutex
//! let token = LockToken::of(&*lock);
//!
//! lksmith::optional_init(token, false, true).unwrap();
//! let _ = lksmith::prelock(token, true);
//! // … acquire the underlying primitive …
//! lksmith::postlock(token, true);
//! // … critical section …
//! if lksmith::preunlock(token).is_ok() {
//!     // … release the underlying primitive …
//!     lksmith::postunlock(token);
//! }
//! lksmith::destroy(token).unwrap();
//! ```
//!
//! Ready-made wrappers that drive this protocol around real primitives live
//! in the `lksmith-sync` crate.
//!
//! Internally, observed orderings accumulate in a directed graph — an edge
//! `A → B` means some thread held `A` while acquiring `B` — and every
//! acquisition runs a generation-stamped depth-first search over it, so an
//! inversion is reported the moment the second leg of a cycle is attempted,
//! whether or not the schedule ever actually deadlocks.
//!
//! Reporting goes to stderr by default; `LKSMITH_LOG` selects stdout, a
//! file, syslog, or a callback instead, and an in-process [`ReportHook`]
//! can observe every [`Report`]. `LKSMITH_IGNORED_FRAMES` and
//! `LKSMITH_IGNORED_FRAME_PATTERNS` suppress dependency processing for
//! acquisitions made beneath the named stack frames.

mod error;
mod graph;
mod ignore;
mod record;
mod registry;
mod sink;
mod snapshot;
mod tls;
mod validator;

pub use error::{HeldState, LockError};
pub use ignore::{ignored_frame_patterns, ignored_frames};
pub use record::LockToken;
pub use sink::{RawReportFn, Report, ReportHook, set_report_hook};
pub use snapshot::{HolderSnapshot, LockSnapshot, ValidatorSnapshot, snapshot};
pub use tls::{THREAD_NAME_MAX, set_thread_name, thread_name};
pub use validator::{
    check_locked, destroy, optional_init, postlock, postunlock, prelock, preunlock,
};

/// Validator version as (major, minor). Major bumps break the protocol
/// contract; minor bumps only add to it.
pub const VERSION: (u16, u16) = (0, 1);

/// Human-readable form of [`VERSION`].
pub fn version_string() -> String {
    format!("{}.{}", VERSION.0, VERSION.1)
}
