//! Process-wide set of transaction ids currently "in flight".

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::types::TxId;

/// Not a validity cache: presence only means "already claimed by some
/// ticket", not "admitted".
pub struct DedupCache {
    ids: Mutex<HashSet<TxId>>,
}

impl DedupCache {
    pub fn new() -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
        }
    }

    pub fn has(&self, id: &TxId) -> bool {
        self.ids.lock().contains(id)
    }

    /// Idempotent.
    pub fn insert(&self, id: TxId) {
        self.ids.lock().insert(id);
    }

    /// Idempotent.
    pub fn remove(&self, id: &TxId) {
        self.ids.lock().remove(id);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_remove_are_idempotent() {
        let cache = DedupCache::new();
        let id: TxId = "a".into();
        assert!(!cache.has(&id));
        cache.insert(id.clone());
        cache.insert(id.clone());
        assert!(cache.has(&id));
        assert_eq!(cache.len(), 1);
        cache.remove(&id);
        cache.remove(&id);
        assert!(!cache.has(&id));
    }
}
