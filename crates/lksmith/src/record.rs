//! Lock identity, per-lock records, and active-holder bookkeeping.

use std::collections::BTreeSet;
use std::fmt;

use compact_str::CompactString;

/// Opaque, address-like identity of a lock.
///
/// The validator never dereferences the value; it is only the registry key.
/// The token must stay stable (and unique among live locks) for as long as
/// the lock exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LockToken(usize);

impl LockToken {
    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    /// Token of a value by its address. The value must not move while the
    /// validator knows about it.
    pub fn of<T>(value: &T) -> Self {
        Self::from_ptr(value as *const T)
    }

    pub const fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Display for LockToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One active hold on one lock by one thread.
#[derive(Debug, Clone)]
pub(crate) struct Holder {
    /// Holding thread's name, snapshotted at acquisition time.
    pub thread: CompactString,
    /// Symbolic frames captured at acquisition time.
    pub frames: Vec<String>,
}

/// Everything the validator knows about one live lock.
#[derive(Debug)]
pub(crate) struct LockRecord {
    pub token: LockToken,
    /// The underlying primitive tolerates same-thread re-acquisition.
    pub recursive: bool,
    /// Acquisition may block, as opposed to busy-waiting.
    pub sleeper: bool,
    /// Successful acquisitions over the record's lifetime, saturating.
    pub nlock: u64,
    /// One-shot flag for the spin-then-sleep hazard report.
    pub spin_warned: bool,
    /// Generation stamp for the cycle search. Meaningless between searches.
    pub color: u64,
    /// Locks observed held by some thread while acquiring this one.
    pub before: BTreeSet<LockToken>,
    /// Active holders, most recent first, so reverse-order recursive releases
    /// match most-recent acquisitions.
    pub holders: Vec<Holder>,
}

impl LockRecord {
    pub fn new(token: LockToken, recursive: bool, sleeper: bool) -> Self {
        Self {
            token,
            recursive,
            sleeper,
            nlock: 0,
            spin_warned: false,
            color: 0,
            before: BTreeSet::new(),
            holders: Vec::new(),
        }
    }

    /// Record that `other` was held while this lock was being acquired.
    /// Idempotent. A record never lists itself.
    pub fn add_before(&mut self, other: LockToken) {
        if other != self.token {
            self.before.insert(other);
        }
    }

    pub fn remove_before(&mut self, other: LockToken) {
        self.before.remove(&other);
    }

    pub fn push_holder(&mut self, holder: Holder) {
        self.holders.insert(0, holder);
    }

    /// Drop the most recent holder entry owned by `thread`. Returns whether
    /// one was found.
    pub fn remove_holder_for_thread(&mut self, thread: &str) -> bool {
        match self.holders.iter().position(|h| h.thread == thread) {
            Some(index) => {
                self.holders.remove(index);
                true
            }
            None => false,
        }
    }

    /// One-line description for diagnostics.
    pub fn describe(&self) -> String {
        format!(
            "lock {} ({}{}, taken {} times, {} holders)",
            self.token,
            if self.recursive { "recursive " } else { "" },
            if self.sleeper { "sleeper" } else { "spin" },
            self.nlock,
            self.holders.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(raw: usize) -> LockRecord {
        LockRecord::new(LockToken::from_raw(raw), false, true)
    }

    #[test]
    fn before_insertion_is_idempotent() {
        let mut rec = record(0x10);
        rec.add_before(LockToken::from_raw(0x20));
        rec.add_before(LockToken::from_raw(0x20));
        assert_eq!(rec.before.len(), 1);
        rec.remove_before(LockToken::from_raw(0x20));
        assert!(rec.before.is_empty());
    }

    #[test]
    fn before_never_contains_self() {
        let mut rec = record(0x10);
        rec.add_before(LockToken::from_raw(0x10));
        assert!(rec.before.is_empty());
    }

    #[test]
    fn holders_are_removed_most_recent_first() {
        let mut rec = record(0x10);
        for frames in [vec!["outer".to_string()], vec!["inner".to_string()]] {
            rec.push_holder(Holder {
                thread: CompactString::from("worker"),
                frames,
            });
        }
        assert!(rec.remove_holder_for_thread("worker"));
        // The most recent acquisition ("inner") went first.
        assert_eq!(rec.holders.len(), 1);
        assert_eq!(rec.holders[0].frames[0], "outer");
        assert!(!rec.remove_holder_for_thread("nobody"));
    }

    #[test]
    fn token_renders_as_hex() {
        assert_eq!(LockToken::from_raw(0xabc).to_string(), "0xabc");
    }
}
