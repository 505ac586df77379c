use crate::domain::transaction::{OrderId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Unused entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// A key whose invariants must be checked and written by one caller at a time.
///
/// Variant order is the global lock order: orders before users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockKey {
    Order(OrderId),
    User(UserId),
}

/// Guards held for one validate → create → dispatch → finalize window.
/// Released on drop.
pub struct LockSet {
    _guards: Vec<OwnedMutexGuard<()>>,
}

/// Per-key async mutexes shared by every service writing to the same ledger.
#[derive(Default)]
pub struct KeyedLocks {
    slots: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks all `keys` in the global order, so two callers asking for
    /// overlapping sets can never deadlock each other.
    pub async fn acquire(&self, keys: &[LockKey]) -> LockSet {
        let mut keys = keys.to_vec();
        keys.sort();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in keys {
            let slot = self.slot(key);
            guards.push(slot.lock_owned().await);
        }
        LockSet { _guards: guards }
    }

    fn slot(&self, key: LockKey) -> Arc<AsyncMutex<()>> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.len() > PRUNE_THRESHOLD {
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
        }
        slots.entry(key).or_default().clone()
    }
}
