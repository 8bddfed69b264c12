//! Point-in-time diagnostic dumps of validator state.

use facet::Facet;

use crate::registry;

/// Everything the validator knows, frozen under the registry lock.
#[derive(Debug, Clone, Facet)]
pub struct ValidatorSnapshot {
    pub locks: Vec<LockSnapshot>,
}

/// One live lock record.
#[derive(Debug, Clone, Facet)]
pub struct LockSnapshot {
    /// The identity token's raw value.
    pub token: u64,
    pub recursive: bool,
    pub sleeper: bool,
    /// Successful acquisitions over the record's lifetime.
    pub nlock: u64,
    /// Raw tokens of locks observed held while acquiring this one.
    pub before: Vec<u64>,
    /// Active holders, most recent first.
    pub holders: Vec<HolderSnapshot>,
}

/// One active hold.
#[derive(Debug, Clone, Facet)]
pub struct HolderSnapshot {
    pub thread: String,
    pub frames: Vec<String>,
}

/// Capture a snapshot of every live lock record.
///
/// Tokens are raw values so the snapshot stays plain data; order follows the
/// registry's deterministic token order.
pub fn snapshot() -> ValidatorSnapshot {
    let reg = registry::lock();
    let mut locks = Vec::with_capacity(reg.locks.len());
    reg.for_each(|record| {
        locks.push(LockSnapshot {
            token: record.token.as_raw() as u64,
            recursive: record.recursive,
            sleeper: record.sleeper,
            nlock: record.nlock,
            before: record.before.iter().map(|t| t.as_raw() as u64).collect(),
            holders: record
                .holders
                .iter()
                .map(|holder| HolderSnapshot {
                    thread: holder.thread.to_string(),
                    frames: holder.frames.clone(),
                })
                .collect(),
        });
    });
    ValidatorSnapshot { locks }
}

impl ValidatorSnapshot {
    /// Find a lock by raw token value.
    pub fn lock(&self, token: u64) -> Option<&LockSnapshot> {
        self.locks.iter().find(|lock| lock.token == token)
    }
}
