//! Reference file backend: fjall index plus one append-only blob per upload

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;
use tusk_core::*;
use crate::locks::UploadLocks;
use crate::{StorageEngine, UploadIndex, UploadStore};

/// Durable upload store.
///
/// Appends write the blob first and the record second. A crash between the
/// two leaves bytes past the recorded offset; the next append truncates the
/// blob back to the offset before writing, so those bytes are never served.
pub struct FileStore {
    engine: StorageEngine,
    index: UploadIndex,
    locks: UploadLocks,
}

impl FileStore {
    pub fn new(engine: StorageEngine) -> Result<Self> {
        let index = engine.index()?;
        Ok(FileStore {
            engine,
            index,
            locks: UploadLocks::new(),
        })
    }

    /// Records currently held by the store
    pub fn uploads(&self) -> Result<Vec<UploadRecord>> {
        self.index.scan()
    }

    pub fn engine(&self) -> &StorageEngine {
        &self.engine
    }

    fn blob_name(id: &UploadId) -> String {
        format!("{}.bin", id.as_str())
    }

    fn blob_path(&self, id: &UploadId) -> PathBuf {
        self.engine.blob_dir().join(Self::blob_name(id))
    }

    fn lock_poisoned() -> TuskError {
        TuskError::Internal("upload lock poisoned".to_string())
    }
}

impl UploadStore for FileStore {
    fn create(
        &self,
        total_length: u64,
        metadata: Metadata,
        checksum_algorithm: Option<&str>,
    ) -> Result<UploadId> {
        let id = UploadId::generate();

        let blob = File::create(self.blob_path(&id))?;
        blob.sync_all()?;

        let record = UploadRecord::new(
            id.clone(),
            total_length,
            metadata,
            checksum_algorithm.map(str::to_string),
            format!("blobs/{}", Self::blob_name(&id)),
        );
        self.index.put(&record)?;

        Ok(id)
    }

    fn get(&self, id: &UploadId) -> Result<Option<UploadRecord>> {
        self.index.get(id)
    }

    fn append(&self, id: &UploadId, claimed_offset: u64, bytes: &[u8]) -> Result<u64> {
        let lock = self.locks.for_id(id)?;
        let _guard = lock.lock().map_err(|_| Self::lock_poisoned())?;

        let mut record = self
            .index
            .get(id)?
            .ok_or_else(|| TuskError::UploadNotFound { id: id.to_string() })?;

        let new_offset = record.check_append(claimed_offset, bytes.len() as u64)?;
        if bytes.is_empty() {
            return Ok(new_offset);
        }

        let mut blob = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.blob_path(id))?;
        blob.set_len(claimed_offset)?;
        blob.seek(SeekFrom::Start(claimed_offset))?;
        blob.write_all(bytes)?;
        blob.sync_data()?;

        record.offset = new_offset;
        self.index.put(&record)?;

        Ok(new_offset)
    }

    fn delete(&self, id: &UploadId) -> Result<bool> {
        let lock = self.locks.for_id(id)?;
        let _guard = lock.lock().map_err(|_| Self::lock_poisoned())?;

        let existed = self.index.remove(id)?;
        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(existed)
    }

    fn read_content(&self, id: &UploadId) -> Result<Option<Vec<u8>>> {
        let record = match self.index.get(id)? {
            Some(record) => record,
            None => return Ok(None),
        };

        let mut data = match fs::read(self.blob_path(id)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        data.truncate(record.offset as usize);

        Ok(Some(data))
    }
}
