//! The validation protocol: `prelock` / `postlock` / `preunlock` /
//! `postunlock`, plus `check_locked`, `optional_init`, and `destroy`.
//!
//! The host program brackets every lock operation with these entry points;
//! the underlying primitive itself is never touched here. All entry points
//! pass through immediately when the calling thread is already inside the
//! validator (see [`crate::tls`]).
//!
//! Locking discipline: backtrace capture (no locks) → registry lock →
//! report emission (sink lock). Reports observed under the registry lock are
//! queued and emitted only after it is released.

use compact_str::CompactString;
use tracing::trace;

use crate::error::{HeldState, LockError};
use crate::record::{Holder, LockToken};
use crate::sink::{self, Report};
use crate::{graph, ignore, registry, tls};

/// A report observed while the registry lock was held, emitted after it is
/// released.
struct PendingReport {
    op: &'static str,
    token: Option<LockToken>,
    kind: LockError,
    message: String,
    frames: Option<Vec<String>>,
}

impl PendingReport {
    fn plain(op: &'static str, token: LockToken, kind: LockError, message: String) -> Self {
        Self {
            op,
            token: Some(token),
            kind,
            message,
            frames: None,
        }
    }
}

fn flush(thread: &str, pending: Vec<PendingReport>) {
    for report in &pending {
        sink::emit(&Report {
            op: report.op,
            token: report.token,
            thread,
            kind: report.kind,
            message: &report.message,
            frames: report.frames.as_deref(),
        });
    }
}

fn current_thread_name() -> CompactString {
    tls::with_state(|state| state.name.clone())
}

/// Register a lock before first use, with declared properties.
///
/// Optional: a lock first seen by [`prelock`] is registered lazily with
/// permissive defaults instead. Fails with `AlreadyExists` if the token is
/// already registered — the caller treats that as a double initialization.
pub fn optional_init(token: LockToken, recursive: bool, sleeper: bool) -> Result<(), LockError> {
    if !tls::intercept_enabled() {
        return Ok(());
    }
    let thread = current_thread_name();
    let result = {
        let mut reg = registry::lock();
        reg.insert(token, recursive, sleeper).map(|_| ())
    };
    if let Err(kind) = result {
        sink::emit(&Report {
            op: "optional_init",
            token: Some(token),
            thread: &thread,
            kind,
            message: "lock is already registered (double initialization?)",
            frames: None,
        });
    }
    result
}

/// Validate an acquisition attempt, before the underlying primitive runs.
///
/// Captures the prospective holder (thread name + backtrace), checks the
/// attempt against the lock graph, records new ordering edges, and files the
/// holder provisionally on the record. Returns `Deadlock` if a hazard was
/// reported; the acquisition itself is not blocked — the caller decides
/// whether to honor the verdict. [`postlock`] must follow either way.
pub fn prelock(token: LockToken, sleeper: bool) -> Result<(), LockError> {
    if !tls::intercept_enabled() {
        return Ok(());
    }

    let thread = current_thread_name();
    let frames = {
        let _guard = tls::PassThrough::enter();
        match tls::with_state(|state| lksmith_backtrace::capture(&mut state.scratch)) {
            Ok(frames) => frames,
            Err(_) => {
                sink::emit(&Report {
                    op: "prelock",
                    token: Some(token),
                    thread: &thread,
                    kind: LockError::OutOfMemory,
                    message: "failed to capture an acquisition backtrace",
                    frames: None,
                });
                return Err(LockError::OutOfMemory);
            }
        }
    };
    let skip = ignore::should_skip(&frames);
    let held: Vec<LockToken> = tls::with_state(|state| state.held.clone());

    let mut verdict = Ok(());
    let mut pending = Vec::new();
    {
        let mut reg = registry::lock();
        // Unknown origin: may be a statically initialized recursive lock, so
        // default to the permissive interpretation.
        let recursive = reg.find_or_create(token, true, sleeper).recursive;

        if !skip {
            let color = reg.next_color();
            for &prior in &held {
                if reg.find(prior).is_none() {
                    pending.push(PendingReport::plain(
                        "prelock",
                        prior,
                        LockError::NotFound,
                        "held lock has no record (destroyed while held?)".to_string(),
                    ));
                    continue;
                }
                if prior == token {
                    if recursive {
                        continue;
                    }
                    verdict = Err(LockError::Deadlock);
                    pending.push(PendingReport {
                        op: "prelock",
                        token: Some(token),
                        kind: LockError::Deadlock,
                        message: "re-acquiring a non-recursive lock this thread already holds"
                            .to_string(),
                        frames: Some(frames.clone()),
                    });
                    continue;
                }
                if graph::reaches(&mut reg.locks, prior, token, color) {
                    verdict = Err(LockError::Deadlock);
                    pending.push(PendingReport {
                        op: "prelock",
                        token: Some(token),
                        kind: LockError::Deadlock,
                        message: format!(
                            "lock order inversion: this lock is supposed to be taken before {prior}"
                        ),
                        frames: Some(frames.clone()),
                    });
                    continue;
                }
                let record = reg.find(token).expect("invariant violated: record was created at the top of prelock");
                record.add_before(prior);
                trace!(%token, %prior, "before-edge recorded");
            }
        }

        let record = reg.find(token).expect("invariant violated: record was created at the top of prelock");
        record.push_holder(Holder {
            thread: thread.clone(),
            frames,
        });
    }
    flush(&thread, pending);
    verdict
}

/// Commit or abandon the acquisition [`prelock`] prepared, after the
/// underlying primitive returned. `acquired` is false when the underlying
/// operation failed (e.g. a `try_lock` miss or a timeout).
pub fn postlock(token: LockToken, acquired: bool) {
    if !tls::intercept_enabled() {
        return;
    }
    let thread = current_thread_name();
    let mut pending = Vec::new();
    {
        let mut reg = registry::lock();
        match reg.find(token) {
            None => pending.push(PendingReport::plain(
                "postlock",
                token,
                LockError::Internal,
                "no record for a lock that just went through prelock".to_string(),
            )),
            Some(record) if !acquired => {
                // The acquisition attempt failed; discard the provisional
                // holder.
                if !record.remove_holder_for_thread(&thread) {
                    pending.push(PendingReport::plain(
                        "postlock",
                        token,
                        LockError::Internal,
                        "no provisional holder entry to discard".to_string(),
                    ));
                }
            }
            Some(record) => {
                record.nlock = record.nlock.saturating_add(1);
                let sleeper = record.sleeper;
                let spins = tls::with_state(|state| {
                    state.held.push(token);
                    if !sleeper {
                        state.num_spins += 1;
                    }
                    state.num_spins
                });
                if sleeper && spins > 0 && !record.spin_warned {
                    record.spin_warned = true;
                    pending.push(PendingReport::plain(
                        "postlock",
                        token,
                        LockError::WouldBlock,
                        "blocking lock acquired while holding a spinlock".to_string(),
                    ));
                }
            }
        }
    }
    flush(&thread, pending);
}

/// Validate a release attempt. Returns `NotPermitted` — and the underlying
/// unlock must then not happen — when the calling thread does not hold the
/// lock.
pub fn preunlock(token: LockToken) -> Result<(), LockError> {
    if !tls::intercept_enabled() {
        return Ok(());
    }
    let thread = current_thread_name();

    let known_sleeper = {
        let mut reg = registry::lock();
        reg.find(token).map(|record| record.sleeper)
    };
    let Some(sleeper) = known_sleeper else {
        sink::emit(&Report {
            op: "preunlock",
            token: Some(token),
            thread: &thread,
            kind: LockError::NotFound,
            message: "unlock of a lock the validator has never seen",
            frames: None,
        });
        return Err(LockError::NotFound);
    };

    let holds = tls::with_state(|state| state.holds(token));
    if !holds {
        sink::emit(&Report {
            op: "preunlock",
            token: Some(token),
            thread: &thread,
            kind: LockError::NotPermitted,
            message: "unlock of a lock this thread does not hold",
            frames: None,
        });
        return Err(LockError::NotPermitted);
    }

    if !sleeper {
        tls::with_state(|state| state.num_spins = state.num_spins.saturating_sub(1));
    }
    Ok(())
}

/// Finish a release: drop the thread's most recent hold and the matching
/// holder entry. Any disagreement with [`preunlock`] is a logic error and is
/// reported as such.
pub fn postunlock(token: LockToken) {
    if !tls::intercept_enabled() {
        return;
    }
    let thread = current_thread_name();

    let removed = tls::with_state(|state| state.remove_last_held(token));
    let mut pending = Vec::new();
    {
        let mut reg = registry::lock();
        match reg.find(token) {
            None => pending.push(PendingReport::plain(
                "postunlock",
                token,
                LockError::Internal,
                "record vanished between preunlock and postunlock".to_string(),
            )),
            Some(record) => {
                if !record.remove_holder_for_thread(&thread) {
                    pending.push(PendingReport::plain(
                        "postunlock",
                        token,
                        LockError::Internal,
                        "no holder entry for the releasing thread".to_string(),
                    ));
                }
            }
        }
    }
    if !removed {
        pending.push(PendingReport::plain(
            "postunlock",
            token,
            LockError::Internal,
            "released lock was not in this thread's held set".to_string(),
        ));
    }
    flush(&thread, pending);
}

/// Does the calling thread hold `token`?
///
/// Meant for condition-wait validation: a [`HeldState::NotHeld`] verdict is
/// reported and must cause the caller to refuse the wait with
/// `NotPermitted`. Passes through as `Held` when interception is off.
pub fn check_locked(token: LockToken) -> Result<HeldState, LockError> {
    if !tls::intercept_enabled() {
        return Ok(HeldState::Held);
    }
    let holds = tls::with_state(|state| state.holds(token));
    if holds {
        return Ok(HeldState::Held);
    }
    let thread = current_thread_name();
    sink::emit(&Report {
        op: "check_locked",
        token: Some(token),
        thread: &thread,
        kind: LockError::NotPermitted,
        message: "condition wait on a mutex this thread does not hold",
        frames: None,
    });
    Ok(HeldState::NotHeld)
}

/// Retire a lock's record.
///
/// Refused with `Busy` while any thread still holds the lock. On success the
/// token is also erased from every other record's before-set, so no dangling
/// ordering reference survives. `NotFound` is benign: the lock never met the
/// validator.
pub fn destroy(token: LockToken) -> Result<(), LockError> {
    if !tls::intercept_enabled() {
        return Ok(());
    }
    let thread = current_thread_name();

    enum Verdict {
        Missing,
        Busy(String),
        Removable,
    }

    let mut pending = Vec::new();
    let result = {
        let mut reg = registry::lock();
        let verdict = match reg.find(token) {
            None => Verdict::Missing,
            Some(record) if !record.holders.is_empty() => {
                // Distinguish the self-inflicted case in the report.
                Verdict::Busy(if record.holders.iter().any(|h| h.thread == thread) {
                    format!("destroying a {} this thread still holds", record.describe())
                } else {
                    format!(
                        "destroying a {} still held by another thread",
                        record.describe()
                    )
                })
            }
            Some(_) => Verdict::Removable,
        };
        match verdict {
            Verdict::Missing => Err(LockError::NotFound),
            Verdict::Busy(message) => {
                pending.push(PendingReport::plain(
                    "destroy",
                    token,
                    LockError::Busy,
                    message,
                ));
                Err(LockError::Busy)
            }
            Verdict::Removable => {
                reg.purge_references(token);
                reg.remove(token);
                Ok(())
            }
        }
    };
    flush(&thread, pending);
    result
}
