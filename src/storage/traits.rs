use anyhow::Result;
use serde::{Serialize, de::DeserializeOwned};

/// Narrow key/value contract the scanner needs from its store.
/// Keys and values are UTF-8 strings; keys are namespaced by chain
/// symbol (see `schema::keys`).
pub trait KVStorage: Send + Sync {
    /// One-time setup after opening (no-op for stores without it).
    fn init(&self) -> Result<()>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    fn read(&self, key: &str) -> Result<Option<String>>;

    fn delete(&self, key: &str) -> Result<()>;

    fn exists(&self, key: &str) -> Result<bool>;

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()>;

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>;

    /// All `(key, value)` pairs whose key starts with `prefix`, in key
    /// order, up to `limit` when given.
    fn scan_prefix(&self, prefix: &str, limit: Option<usize>) -> Result<Vec<(String, String)>>;
}
