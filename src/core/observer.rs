use anyhow::Result;
use async_trait::async_trait;

use crate::core::table::{BlockHeader, ExtractRecord};

/// Downstream consumer of scan notifications (a wallet backend, an
/// indexer, ...). Record deliveries may repeat across rescans; consumers
/// deduplicate on `ExtractRecord::sid`.
#[async_trait]
pub trait BlockScanObserver: Send + Sync {
    /// A block finished scanning, or - when `header.fork` is true - a
    /// previously announced block was superseded by a chain fork.
    async fn new_block_notify(&self, header: &BlockHeader);

    /// One extracted record for the account behind `account_key`. An
    /// error marks the block for rescan; it never aborts the scan pass.
    async fn block_extract_data_notify(
        &self,
        account_key: &str,
        record: &ExtractRecord,
    ) -> Result<()>;
}

/// Membership test for watched accounts, supplied by the account layer.
/// Maps an on-chain address to the internal account key tracking it, or
/// `None` when the address is not watched.
pub trait ScanTargetResolver: Send + Sync {
    fn resolve(&self, address: &str) -> Option<String>;
}
