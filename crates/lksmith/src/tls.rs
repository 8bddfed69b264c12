//! Per-thread validator state.
//!
//! Allocated lazily on a thread's first contact with the validator, torn
//! down by the thread-local destructor when the thread exits. Safe to reach
//! from arbitrary program code, including very early — before any explicit
//! initialization has run.

use std::cell::{Cell, RefCell};

use compact_str::{CompactString, format_compact};
use lksmith_backtrace::CaptureScratch;

use crate::record::LockToken;

/// Maximum thread-name length in bytes, including a terminator byte.
pub const THREAD_NAME_MAX: usize = 16;

pub(crate) struct ThreadState {
    /// Symbolic thread name; defaults to `thread_<tid>`.
    pub name: CompactString,
    /// Tokens of currently-held locks, acquisition order preserved.
    /// Duplicates are allowed: recursive locks appear once per acquisition.
    pub held: Vec<LockToken>,
    /// How many entries of `held` are non-sleeper locks.
    pub num_spins: u32,
    /// Reusable backtrace capture buffer.
    pub scratch: CaptureScratch,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            name: default_thread_name(),
            held: Vec::new(),
            num_spins: 0,
            scratch: CaptureScratch::new(),
        }
    }

    /// Remove the last `held` entry equal to `token`, mirroring LIFO
    /// recursive release. Returns whether one was found.
    pub fn remove_last_held(&mut self, token: LockToken) -> bool {
        match self.held.iter().rposition(|&t| t == token) {
            Some(index) => {
                self.held.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn holds(&self, token: LockToken) -> bool {
        self.held.contains(&token)
    }
}

thread_local! {
    static STATE: RefCell<ThreadState> = RefCell::new(ThreadState::new());
    /// Reentrancy guard. While false, validator entry points pass through:
    /// the thread is inside the validator (capturing a backtrace, emitting a
    /// report) and any instrumented call it makes must not be processed.
    static INTERCEPT: Cell<bool> = const { Cell::new(true) };
}

pub(crate) fn with_state<R>(f: impl FnOnce(&mut ThreadState) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

pub(crate) fn intercept_enabled() -> bool {
    INTERCEPT.with(Cell::get)
}

/// Clears the intercept flag for the guard's lifetime.
pub(crate) struct PassThrough {
    was: bool,
}

impl PassThrough {
    pub fn enter() -> Self {
        let was = INTERCEPT.with(|flag| flag.replace(false));
        Self { was }
    }
}

impl Drop for PassThrough {
    fn drop(&mut self) {
        INTERCEPT.with(|flag| flag.set(self.was));
    }
}

/// Current thread's symbolic name.
pub fn thread_name() -> String {
    with_state(|state| state.name.to_string())
}

/// Override the current thread's name. Truncated to fit
/// [`THREAD_NAME_MAX`] bytes including a terminator.
pub fn set_thread_name(name: &str) {
    let truncated = truncate_name(name);
    with_state(|state| state.name = CompactString::from(truncated));
}

fn truncate_name(name: &str) -> &str {
    let limit = THREAD_NAME_MAX - 1;
    if name.len() <= limit {
        return name;
    }
    let mut end = limit;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

fn default_thread_name() -> CompactString {
    #[cfg(target_os = "linux")]
    let tid = unsafe { libc::gettid() } as u64;
    #[cfg(not(target_os = "linux"))]
    let tid = unsafe { libc::pthread_self() } as u64;
    format_compact!("thread_{tid}")
}
