//! Process-wide lock registry.
//!
//! One map from identity token to lock record, one generation counter for the
//! cycle search, both behind a single mutex. Every edge insertion, holder
//! mutation, and destroy linearizes here.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::LockError;
use crate::record::{LockRecord, LockToken};

pub(crate) struct Registry {
    pub locks: BTreeMap<LockToken, LockRecord>,
    /// Generation stamp source for the cycle search. Bumped once per
    /// dependency-processing pass.
    color: u64,
}

static REGISTRY: LazyLock<Mutex<Registry>> = LazyLock::new(|| {
    Mutex::new(Registry {
        locks: BTreeMap::new(),
        color: 0,
    })
});

/// Acquire the registry lock.
///
/// The error-sink lock must never be taken while this guard is live.
pub(crate) fn lock() -> MutexGuard<'static, Registry> {
    REGISTRY.lock()
}

impl Registry {
    /// Return the record for `token`, creating it with the given properties
    /// if absent. Properties of an existing record are left untouched.
    pub fn find_or_create(
        &mut self,
        token: LockToken,
        recursive: bool,
        sleeper: bool,
    ) -> &mut LockRecord {
        self.locks.entry(token).or_insert_with(|| {
            debug!(%token, recursive, sleeper, "registering lock");
            LockRecord::new(token, recursive, sleeper)
        })
    }

    /// Create a record for `token`, refusing if one already exists.
    pub fn insert(
        &mut self,
        token: LockToken,
        recursive: bool,
        sleeper: bool,
    ) -> Result<&mut LockRecord, LockError> {
        if self.locks.contains_key(&token) {
            return Err(LockError::AlreadyExists);
        }
        debug!(%token, recursive, sleeper, "registering lock");
        Ok(self
            .locks
            .entry(token)
            .or_insert_with(|| LockRecord::new(token, recursive, sleeper)))
    }

    pub fn find(&mut self, token: LockToken) -> Option<&mut LockRecord> {
        self.locks.get_mut(&token)
    }

    pub fn remove(&mut self, token: LockToken) -> Option<LockRecord> {
        let removed = self.locks.remove(&token);
        if removed.is_some() {
            debug!(%token, "deregistering lock");
        }
        removed
    }

    /// Visit every live record under the registry lock.
    pub fn for_each(&self, mut visit: impl FnMut(&LockRecord)) {
        for record in self.locks.values() {
            visit(record);
        }
    }

    /// Erase `token` from every other record's before-set, ahead of removal.
    pub fn purge_references(&mut self, token: LockToken) {
        for record in self.locks.values_mut() {
            if record.token != token {
                record.remove_before(token);
            }
        }
    }

    /// Start a new cycle-search generation.
    pub fn next_color(&mut self) -> u64 {
        self.color = self.color.wrapping_add(1);
        self.color
    }
}
