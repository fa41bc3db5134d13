//! Upload storage: the contract the protocol server runs on, plus the
//! fjall-indexed file backend and an in-memory backend.

use fjall::{Config, Keyspace, PersistMode};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tusk_core::*;

pub mod file_store;
pub mod index;
pub mod locks;
pub mod memory;

pub use file_store::*;
pub use index::*;
pub use memory::*;

/// Storage contract shared by every backend.
///
/// `append` is the single point of concurrency safety for the protocol:
/// the claimed offset is compared with the stored offset and the bytes are
/// applied as one atomic step per upload id. Exactly one caller can succeed
/// for a given offset value, and bytes plus offset are durable before it
/// returns.
pub trait UploadStore: Send + Sync {
    /// Create a new upload and return its id
    fn create(
        &self,
        total_length: u64,
        metadata: Metadata,
        checksum_algorithm: Option<&str>,
    ) -> Result<UploadId>;

    /// Current record, `None` if the id is unknown
    fn get(&self, id: &UploadId) -> Result<Option<UploadRecord>>;

    /// Append `bytes` at `claimed_offset`, returning the new offset
    fn append(&self, id: &UploadId, claimed_offset: u64, bytes: &[u8]) -> Result<u64>;

    /// Remove the upload, `false` if it did not exist
    fn delete(&self, id: &UploadId) -> Result<bool>;

    /// Bytes accepted so far
    fn read_content(&self, id: &UploadId) -> Result<Option<Vec<u8>>>;
}

impl<S: UploadStore + ?Sized> UploadStore for Arc<S> {
    fn create(
        &self,
        total_length: u64,
        metadata: Metadata,
        checksum_algorithm: Option<&str>,
    ) -> Result<UploadId> {
        (**self).create(total_length, metadata, checksum_algorithm)
    }

    fn get(&self, id: &UploadId) -> Result<Option<UploadRecord>> {
        (**self).get(id)
    }

    fn append(&self, id: &UploadId, claimed_offset: u64, bytes: &[u8]) -> Result<u64> {
        (**self).append(id, claimed_offset, bytes)
    }

    fn delete(&self, id: &UploadId) -> Result<bool> {
        (**self).delete(id)
    }

    fn read_content(&self, id: &UploadId) -> Result<Option<Vec<u8>>> {
        (**self).read_content(id)
    }
}

/// Storage engine: fjall keyspace for records, a directory for blobs
#[derive(Clone)]
pub struct StorageEngine {
    keyspace: Arc<Keyspace>,
    blob_dir: PathBuf,
}

impl StorageEngine {
    /// Open (or create) a storage engine rooted at `path`
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();
        let blob_dir = root.join("blobs");
        std::fs::create_dir_all(&blob_dir)?;

        let keyspace = Arc::new(
            Config::new(root.join("index"))
                .open()
                .map_err(|e| TuskError::Storage(e.to_string()))?,
        );

        Ok(StorageEngine { keyspace, blob_dir })
    }

    /// Create temporary storage engine for testing
    #[cfg(any(test, feature = "test-utils"))]
    pub fn temp() -> Result<(Self, tempfile::TempDir)> {
        let temp_dir = tempfile::tempdir()?;
        let engine = Self::new(temp_dir.path())?;
        Ok((engine, temp_dir))
    }

    /// Open the upload index
    pub fn index(&self) -> Result<UploadIndex> {
        UploadIndex::new(self.clone())
    }

    pub(crate) fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Directory holding one append-only blob per upload
    pub fn blob_dir(&self) -> &Path {
        &self.blob_dir
    }

    /// Persist all index changes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .map_err(|e| TuskError::Storage(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_engine_creation() {
        let (engine, temp) = StorageEngine::temp().unwrap();
        assert!(engine.blob_dir().starts_with(temp.path()));
        assert!(engine.blob_dir().is_dir());
    }

    #[test]
    fn test_index_opens() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let index = engine.index().unwrap();
        assert!(index.scan().unwrap().is_empty());
    }
}
