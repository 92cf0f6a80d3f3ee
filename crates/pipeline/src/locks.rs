use std::collections::BTreeMap;

use nile_storage::Collection;
use tokio::sync::{Mutex, MutexGuard};

/// One async mutex per collection.
///
/// Operations that touch several collections lock them through
/// [`CollectionLocks::acquire`], which always takes them in `Collection`
/// declaration order, so two transitions can never deadlock.
#[derive(Debug)]
pub struct CollectionLocks {
    locks: BTreeMap<Collection, Mutex<()>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self {
            locks: Collection::ALL
                .iter()
                .map(|c| (*c, Mutex::new(())))
                .collect(),
        }
    }

    /// Lock every collection in `collections`. Duplicates are ignored.
    pub async fn acquire(&self, collections: &[Collection]) -> Vec<MutexGuard<'_, ()>> {
        let mut ordered = collections.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for collection in ordered {
            if let Some(lock) = self.locks.get(&collection) {
                guards.push(lock.lock().await);
            }
        }
        guards
    }
}

impl Default for CollectionLocks {
    fn default() -> Self {
        Self::new()
    }
}
