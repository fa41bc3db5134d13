//! In-memory upload store

use std::collections::HashMap;
use std::sync::Mutex;
use tusk_core::*;
use crate::UploadStore;

struct Entry {
    record: UploadRecord,
    content: Vec<u8>,
}

/// Non-durable backend for tests and embedding; every operation runs under
/// a single mutex, which makes `append` trivially atomic.
#[derive(Default)]
pub struct MemoryStore {
    uploads: Mutex<HashMap<UploadId, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.uploads.lock().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn uploads(&self) -> Result<std::sync::MutexGuard<'_, HashMap<UploadId, Entry>>> {
        self.uploads
            .lock()
            .map_err(|_| TuskError::Internal("memory store poisoned".to_string()))
    }
}

impl UploadStore for MemoryStore {
    fn create(
        &self,
        total_length: u64,
        metadata: Metadata,
        checksum_algorithm: Option<&str>,
    ) -> Result<UploadId> {
        let id = UploadId::generate();
        let record = UploadRecord::new(
            id.clone(),
            total_length,
            metadata,
            checksum_algorithm.map(str::to_string),
            format!("memory:{}", id),
        );

        self.uploads()?.insert(
            id.clone(),
            Entry {
                record,
                content: Vec::new(),
            },
        );
        Ok(id)
    }

    fn get(&self, id: &UploadId) -> Result<Option<UploadRecord>> {
        Ok(self.uploads()?.get(id).map(|e| e.record.clone()))
    }

    fn append(&self, id: &UploadId, claimed_offset: u64, bytes: &[u8]) -> Result<u64> {
        let mut uploads = self.uploads()?;
        let entry = uploads
            .get_mut(id)
            .ok_or_else(|| TuskError::UploadNotFound { id: id.to_string() })?;

        let new_offset = entry.record.check_append(claimed_offset, bytes.len() as u64)?;
        entry.content.extend_from_slice(bytes);
        entry.record.offset = new_offset;
        Ok(new_offset)
    }

    fn delete(&self, id: &UploadId) -> Result<bool> {
        Ok(self.uploads()?.remove(id).is_some())
    }

    fn read_content(&self, id: &UploadId) -> Result<Option<Vec<u8>>> {
        Ok(self.uploads()?.get(id).map(|e| e.content.clone()))
    }
}
