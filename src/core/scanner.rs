use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

#[async_trait]
pub trait Scanner: Send + Sync {
    /// Scan one block on demand, notifying observers on success. Does not
    /// move the persisted scan cursor.
    async fn scan_block(&self, height: u64) -> Result<()>;

    /// Run the scan loop with graceful shutdown support
    async fn run(&self, shutdown: broadcast::Receiver<()>) -> Result<()>;
}
