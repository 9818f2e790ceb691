use std::sync::Arc;

use anyhow::{Context, Result};
use rocksdb::{DB, Direction, IteratorMode, Options, WriteBatch};
use serde::{Serialize, de::DeserializeOwned};

use crate::storage::traits::KVStorage;

#[derive(Clone)]
pub struct RocksDBStorage {
    db: Arc<DB>,
}

impl RocksDBStorage {
    pub fn new(path: &str) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        // The store only carries small JSON records (chain head, header
        // index, retry markers), so modest buffers are sufficient.
        opts.set_write_buffer_size(32 * 1024 * 1024);
        opts.set_max_write_buffer_number(3);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts.set_max_background_jobs(4);
        opts.set_max_total_wal_size(256 * 1024 * 1024);
        opts.set_paranoid_checks(true);

        let db = DB::open(&opts, path)
            .with_context(|| format!("Could not open RocksDB at {}", path))?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Delete multiple keys in one atomic batch.
    pub fn delete_batch(&self, keys: &[Vec<u8>]) -> Result<()> {
        let mut batch = WriteBatch::default();
        for key in keys {
            batch.delete(key);
        }
        self.db.write(batch).context("Batch delete failed")
    }

    /// Flush memtables so everything in flight hits disk (used on shutdown).
    pub fn flush(&self) -> Result<()> {
        self.db.flush().context("RocksDB flush failed")
    }
}

impl KVStorage for RocksDBStorage {
    fn init(&self) -> Result<()> {
        Ok(())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.db
            .put(key.as_bytes(), value.as_bytes())
            .with_context(|| format!("Put failed for key {}", key))
    }

    fn read(&self, key: &str) -> Result<Option<String>> {
        self.db
            .get(key.as_bytes())?
            .map(|raw| {
                String::from_utf8(raw)
                    .with_context(|| format!("Value under key {} is not UTF-8", key))
            })
            .transpose()
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.db
            .delete(key.as_bytes())
            .with_context(|| format!("Delete failed for key {}", key))
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.db.get(key.as_bytes())?.is_some())
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("Could not serialize record for key {}", key))?;
        self.write(key, &json)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.read(key)?
            .map(|json| {
                serde_json::from_str::<T>(&json)
                    .with_context(|| format!("Stored JSON under key {} does not parse", key))
            })
            .transpose()
    }

    fn scan_prefix(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<(String, String)>> {
        let prefix_bytes = prefix.as_bytes();
        let mut results = Vec::new();

        for item in self
            .db
            .iterator(IteratorMode::From(prefix_bytes, Direction::Forward))
        {
            let (key, value) = item.context("RocksDB iterator error")?;

            // The iterator continues past the prefix range; stop at the
            // first non-matching key.
            if !key.starts_with(prefix_bytes) {
                break;
            }

            let pair = (
                String::from_utf8(key.to_vec()).context("Stored key is not UTF-8")?,
                String::from_utf8(value.to_vec()).context("Stored value is not UTF-8")?,
            );
            results.push(pair);

            if let Some(limit) = limit
                && results.len() >= limit
            {
                break;
            }
        }

        Ok(results)
    }
}
