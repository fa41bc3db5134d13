//! Per-upload mutual exclusion for the file backend

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tusk_core::*;

/// Hands out one mutex per upload id, so appends to different uploads
/// never wait on each other.
///
/// The table only holds weak handles. An entry lives as long as some
/// caller holds its lock handle and is pruned afterwards, so the table is
/// bounded by the number of in-flight operations.
#[derive(Default)]
pub struct UploadLocks {
    locks: Mutex<HashMap<UploadId, Weak<Mutex<()>>>>,
}

impl UploadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handle for `id`, shared with every other live handle for it
    pub fn for_id(&self, id: &UploadId) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| TuskError::Internal("upload lock table poisoned".to_string()))?;

        if let Some(lock) = locks.get(id).and_then(Weak::upgrade) {
            return Ok(lock);
        }

        locks.retain(|_, lock| lock.strong_count() > 0);
        let lock = Arc::new(Mutex::new(()));
        locks.insert(id.clone(), Arc::downgrade(&lock));
        Ok(lock)
    }

    /// Entries currently in the table, live or awaiting pruning
    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_id_shares_lock() {
        let locks = UploadLocks::new();
        let id = UploadId::generate();

        let a = locks.for_id(&id).unwrap();
        let b = locks.for_id(&id).unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let other = locks.for_id(&UploadId::generate()).unwrap();
        assert!(!Arc::ptr_eq(&a, &other));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn test_dropped_handles_are_pruned() {
        let locks = UploadLocks::new();
        for _ in 0..100 {
            let handle = locks.for_id(&UploadId::generate()).unwrap();
            drop(handle);
        }
        assert!(locks.len() <= 1);

        let held = locks.for_id(&UploadId::generate()).unwrap();
        let _ = locks.for_id(&UploadId::generate()).unwrap();
        assert!(locks.len() <= 2);
        drop(held);
    }
}
