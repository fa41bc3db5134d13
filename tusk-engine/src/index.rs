//! Durable upload records in a fjall partition

use fjall::{PartitionCreateOptions, PartitionHandle};
use std::sync::Arc;
use tusk_core::*;
use crate::StorageEngine;

const PARTITION: &str = "uploads";
const RECORD_PREFIX: &str = "upload:";

/// One JSON record per upload id
pub struct UploadIndex {
    partition: Arc<PartitionHandle>,
    engine: StorageEngine,
}

impl UploadIndex {
    pub(crate) fn new(engine: StorageEngine) -> Result<Self> {
        let partition = Arc::new(
            engine
                .keyspace()
                .open_partition(PARTITION, PartitionCreateOptions::default())
                .map_err(|e| TuskError::Storage(e.to_string()))?,
        );

        Ok(UploadIndex { partition, engine })
    }

    /// Write a record and flush it to disk
    pub fn put(&self, record: &UploadRecord) -> Result<()> {
        let value = serde_json::to_vec(record).map_err(TuskError::Serialization)?;

        self.partition
            .insert(self.record_key(&record.id), value)
            .map_err(|e| TuskError::Storage(e.to_string()))?;

        self.engine.persist()
    }

    pub fn get(&self, id: &UploadId) -> Result<Option<UploadRecord>> {
        match self.partition.get(self.record_key(id)) {
            Ok(Some(data)) => {
                let record: UploadRecord =
                    serde_json::from_slice(&data).map_err(TuskError::Serialization)?;
                Ok(Some(record))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(TuskError::Storage(e.to_string())),
        }
    }

    /// Remove a record, returning whether it existed
    pub fn remove(&self, id: &UploadId) -> Result<bool> {
        let existed = self
            .partition
            .contains_key(self.record_key(id))
            .map_err(|e| TuskError::Storage(e.to_string()))?;

        if existed {
            self.partition
                .remove(self.record_key(id))
                .map_err(|e| TuskError::Storage(e.to_string()))?;
            self.engine.persist()?;
        }

        Ok(existed)
    }

    /// Every stored record, in id order
    pub fn scan(&self) -> Result<Vec<UploadRecord>> {
        let mut records = Vec::new();

        for item in self.partition.prefix(RECORD_PREFIX) {
            let (_key, value) = item.map_err(|e| TuskError::Storage(format!("Scan error: {}", e)))?;
            let record: UploadRecord =
                serde_json::from_slice(&value).map_err(TuskError::Serialization)?;
            records.push(record);
        }

        Ok(records)
    }

    fn record_key(&self, id: &UploadId) -> Vec<u8> {
        format!("{}{}", RECORD_PREFIX, id.as_str()).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(total: u64) -> UploadRecord {
        let id = UploadId::generate();
        let location = format!("blobs/{}.bin", id);
        UploadRecord::new(id, total, Metadata::new(), None, location)
    }

    #[test]
    fn test_record_roundtrip() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let index = engine.index().unwrap();

        let mut metadata = Metadata::new();
        metadata.insert("filename", "a.bin").unwrap();
        let mut rec = record(1024);
        rec.metadata = metadata;
        rec.offset = 512;
        index.put(&rec).unwrap();

        let loaded = index.get(&rec.id).unwrap().unwrap();
        assert_eq!(loaded.offset, 512);
        assert_eq!(loaded.total_length, 1024);
        assert_eq!(loaded.metadata.get_str("filename"), Some("a.bin"));
    }

    #[test]
    fn test_remove() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let index = engine.index().unwrap();
        let rec = record(10);
        index.put(&rec).unwrap();

        assert!(index.remove(&rec.id).unwrap());
        assert!(index.get(&rec.id).unwrap().is_none());
        assert!(!index.remove(&rec.id).unwrap());
    }

    #[test]
    fn test_scan_returns_all_records() {
        let (engine, _temp) = StorageEngine::temp().unwrap();
        let index = engine.index().unwrap();
        for total in [1, 2, 3] {
            index.put(&record(total)).unwrap();
        }

        let mut totals: Vec<u64> = index.scan().unwrap().iter().map(|r| r.total_length).collect();
        totals.sort();
        assert_eq!(totals, vec![1, 2, 3]);
    }
}
