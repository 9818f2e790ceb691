use crate::core::table::{BlockHeader, ChainHead, UnscanRecord};
use crate::storage::schema::keys;
use crate::storage::traits::KVStorage;
use anyhow::{Context, Result};
use std::sync::Arc;

use super::rocksdb::RocksDBStorage;

pub struct ChainHeadStorage {
    pub storage: Arc<RocksDBStorage>,
    pub symbol: String,
}

impl ChainHeadStorage {
    pub fn get(&self) -> Result<Option<ChainHead>> {
        let key = keys::chain_head_key(&self.symbol);
        self.storage.read_json(&key)
    }

    pub fn save(&self, head: &ChainHead) -> Result<()> {
        let key = keys::chain_head_key(&self.symbol);
        self.storage.write_json(&key, head)
    }

    pub fn delete(&self) -> Result<()> {
        let key = keys::chain_head_key(&self.symbol);
        self.storage.delete(&key)
    }
}

pub struct LocalBlockStorage {
    pub storage: Arc<RocksDBStorage>,
    pub symbol: String,
}

impl LocalBlockStorage {
    pub fn get(&self, height: u64) -> Result<Option<BlockHeader>> {
        let key = keys::block_header_key(&self.symbol, height);
        self.storage.read_json(&key)
    }

    pub fn save(&self, header: &BlockHeader) -> Result<()> {
        let key = keys::block_header_key(&self.symbol, header.height);
        self.storage.write_json(&key, header)
    }
}

pub struct UnscanRecordStorage {
    pub storage: Arc<RocksDBStorage>,
    pub symbol: String,
}

impl UnscanRecordStorage {
    /// Insert or overwrite a retry marker. The id is derived from
    /// (height, tx id), so re-saving the same failure is idempotent.
    pub fn save(&self, record: &UnscanRecord) -> Result<()> {
        let key = keys::unscan_key(&self.symbol, record.block_height, &record.id);
        self.storage.write_json(&key, record)
    }

    /// Every live retry marker for this symbol. Key order is
    /// lexicographic; callers needing numeric height order sort
    /// themselves.
    pub fn all(&self) -> Result<Vec<UnscanRecord>> {
        let prefix = keys::unscan_prefix(&self.symbol);
        let mut records = Vec::new();
        for (key, value) in self.storage.scan_prefix(&prefix, None)? {
            let record = serde_json::from_str::<UnscanRecord>(&value)
                .with_context(|| format!("Corrupt unscan record at key: {}", key))?;
            records.push(record);
        }
        Ok(records)
    }

    /// Delete every retry marker recorded at `height`; returns how many
    /// were removed.
    pub fn delete_by_height(&self, height: u64) -> Result<usize> {
        let prefix = keys::unscan_height_prefix(&self.symbol, height);
        let keys: Vec<Vec<u8>> = self
            .storage
            .scan_prefix(&prefix, None)?
            .into_iter()
            .map(|(key, _)| key.into_bytes())
            .collect();

        let count = keys.len();
        if count > 0 {
            self.storage.delete_batch(&keys)?;
        }
        Ok(count)
    }

    /// Delete the retry marker with the given record id, if present.
    pub fn delete_by_id(&self, id: &str) -> Result<bool> {
        let prefix = keys::unscan_prefix(&self.symbol);
        for (key, value) in self.storage.scan_prefix(&prefix, None)? {
            let record = serde_json::from_str::<UnscanRecord>(&value)
                .with_context(|| format!("Corrupt unscan record at key: {}", key))?;
            if record.id == id {
                self.storage.delete(&key)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

pub struct ScannerStorageManager {
    pub storage: Arc<RocksDBStorage>,
    pub chain_head: Arc<ChainHeadStorage>,
    pub local_blocks: Arc<LocalBlockStorage>,
    pub unscan: Arc<UnscanRecordStorage>,
}

impl ScannerStorageManager {
    pub fn new(storage: Arc<RocksDBStorage>, symbol: String) -> Self {
        Self {
            chain_head: Arc::new(ChainHeadStorage {
                storage: storage.clone(),
                symbol: symbol.clone(),
            }),
            local_blocks: Arc::new(LocalBlockStorage {
                storage: storage.clone(),
                symbol: symbol.clone(),
            }),
            unscan: Arc::new(UnscanRecordStorage {
                storage: storage.clone(),
                symbol,
            }),
            storage,
        }
    }
}
