use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::chains::near::context::NearScannerContext;
use crate::chains::near::extractor::TransferExtractor;
use crate::chains::near::models::Block;
use crate::core::observer::{BlockScanObserver, ScanTargetResolver};
use crate::core::scanner::Scanner;
use crate::core::table::{Balance, BlockHeader, ChainHead, UnscanRecord};
use crate::utils::format::format_amount;

/// After a fork at `forked` the cursor moves two heights below the
/// mismatch, floored at 1. Repeated passes walk further back until the
/// local hash matches the canonical chain again.
fn rewound_height(forked: u64) -> u64 {
    forked.saturating_sub(2).max(1)
}

/// Block scanner for NEAR-compatible chains: follows the remote tip,
/// handles forks, and drives the per-block extraction pipeline.
pub struct NearBlockScanner {
    pub(crate) context: NearScannerContext,
    pub(crate) extractor: TransferExtractor,
    pub(crate) observers: RwLock<Vec<Arc<dyn BlockScanObserver>>>,
    scanning: AtomicBool,
}

impl NearBlockScanner {
    pub fn new(context: NearScannerContext, targets: Arc<dyn ScanTargetResolver>) -> Self {
        let extractor = TransferExtractor::new(context.clone(), targets);
        Self {
            context,
            extractor,
            observers: RwLock::new(Vec::new()),
            scanning: AtomicBool::new(true),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn BlockScanObserver>) {
        if let Ok(mut observers) = self.observers.write() {
            observers.push(observer);
        }
    }

    /// Pause scanning; the in-flight block still runs to completion.
    pub fn pause(&self) {
        self.scanning.store(false, Ordering::SeqCst);
        info!("⏸️ Scanner paused");
    }

    /// Resume a paused scanner at the next loop entry.
    pub fn restart(&self) {
        self.scanning.store(true, Ordering::SeqCst);
        info!("▶️ Scanner restarted");
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    pub(crate) fn observers_snapshot(&self) -> Vec<Arc<dyn BlockScanObserver>> {
        self.observers
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub(crate) async fn new_block_notify(&self, header: BlockHeader) {
        for observer in self.observers_snapshot() {
            observer.new_block_notify(&header).await;
        }
    }

    pub(crate) fn parse_header(&self, block: &Block, fork: bool) -> BlockHeader {
        BlockHeader {
            height: block.header.height,
            hash: block.header.hash.clone(),
            prev_hash: block.header.prev_hash.clone(),
            timestamp: block.header.timestamp_secs(),
            symbol: self.context.symbol().to_string(),
            fork,
        }
    }

    /// The block at the node's current tip.
    async fn latest_block(&self) -> Result<Block> {
        let status = self.context.client.chain_status().await?;
        self.context
            .client
            .block_by_height(status.sync_info.latest_block_height)
            .await
    }

    /// Current scan cursor. When none is persisted yet, seed it from the
    /// remote tip one block back so scanning picks up with the tip
    /// itself; the seed is not written - the head is only persisted once
    /// a block completes.
    async fn current_position(&self) -> Result<(u64, String)> {
        if let Some(head) = self.context.storage.chain_head.get()? {
            return Ok((head.height, head.hash));
        }

        let tip = self.latest_block().await?;
        info!(
            "🌱 No local head, seeding from remote tip {}",
            tip.header.height
        );
        Ok((tip.header.height.saturating_sub(1), tip.header.prev_hash))
    }

    fn save_chain_head(&self, height: u64, hash: &str) -> Result<()> {
        let head = ChainHead::new(self.context.symbol(), height, hash);
        self.context.storage.chain_head.save(&head)
    }

    /// One full scan pass: follow the chain from the stored head toward
    /// the remote tip, handling forks along the way, then re-scan the
    /// recent tail and retry previously failed blocks.
    pub async fn scan_block_task(&self) -> Result<()> {
        let (mut current_height, mut current_hash) = self.current_position().await?;

        loop {
            if !self.is_scanning() {
                // Paused: end the pass right away, rescans included.
                info!("⏸️ Scanning paused at height {}", current_height);
                return Ok(());
            }

            let max_height = match self.context.client.chain_status().await {
                Ok(status) => status.sync_info.latest_block_height,
                Err(e) => {
                    error!("❌ Failed to fetch chain status: {}", e);
                    break;
                }
            };

            // The tip itself may still be replaced; stay one block behind.
            if current_height >= max_height.saturating_sub(1) {
                info!(
                    "✅ Caught up with the network (local {} / remote {})",
                    current_height, max_height
                );
                break;
            }

            current_height += 1;

            let block = match self.context.client.block_by_height(current_height).await {
                Ok(block) => block,
                Err(e) => {
                    error!("❌ Failed to fetch block {}: {}", current_height, e);
                    self.context.metrics.record_block_fetch_failure();
                    let record = UnscanRecord::new(
                        current_height,
                        "",
                        format!("block fetch failed: {}", e),
                    );
                    if let Err(e) = self.context.storage.unscan.save(&record) {
                        error!(
                            "❌ Failed to save unscan record at height {}: {}",
                            current_height, e
                        );
                    }
                    break;
                }
            };

            if block.header.prev_hash != current_hash {
                match self.handle_fork(current_height).await {
                    Ok((height, hash)) => {
                        current_height = height;
                        current_hash = hash;
                    }
                    Err(e) => {
                        error!("❌ Fork rollback failed: {}", e);
                        break;
                    }
                }
                continue;
            }

            current_hash = block.header.hash.clone();

            if let Err(e) = self.batch_extract_transactions(&block).await {
                // Advisory: the failed units are already recorded for rescan.
                warn!("⚠️ Block {} extracted with failures: {}", current_height, e);
            }

            self.save_chain_head(current_height, &current_hash)?;
            self.context
                .storage
                .local_blocks
                .save(&self.parse_header(&block, false))?;
            self.context.metrics.record_block_scanned(current_height);

            info!("📦 Scanned block {} ({})", current_height, current_hash);
            self.new_block_notify(self.parse_header(&block, false)).await;
        }

        if self.context.config.rescan_last_block_count > 0 {
            self.rescan_recent_blocks(self.context.config.rescan_last_block_count)
                .await;
        }
        self.rescan_failed_records().await;

        Ok(())
    }

    /// Roll the cursor back after a prev-hash mismatch at `forked_height`.
    async fn handle_fork(&self, forked_height: u64) -> Result<(u64, String)> {
        warn!("⛓️ Fork detected at height {}, rolling back", forked_height);
        self.context.metrics.record_fork_detected(forked_height);

        let previous_height = forked_height.saturating_sub(1);

        // Header of the block being superseded, for the fork announcement.
        let superseded = match self.context.storage.local_blocks.get(previous_height) {
            Ok(header) => header,
            Err(e) => {
                warn!(
                    "⚠️ Could not load local header {}: {}",
                    previous_height, e
                );
                None
            }
        };

        match self.context.storage.unscan.delete_by_height(previous_height) {
            Ok(removed) if removed > 0 => {
                info!(
                    "🗑️ Dropped {} retry markers at forked height {}",
                    removed, previous_height
                );
            }
            Ok(_) => {}
            Err(e) => {
                error!(
                    "❌ Failed to drop retry markers at height {}: {}",
                    previous_height, e
                );
            }
        }

        let new_height = rewound_height(forked_height);
        let new_hash = match self.context.storage.local_blocks.get(new_height) {
            Ok(Some(local)) => local.hash,
            Ok(None) | Err(_) => {
                self.context
                    .client
                    .block_by_height(new_height)
                    .await
                    .with_context(|| format!("Failed to resolve rewound block {}", new_height))?
                    .header
                    .hash
            }
        };

        info!("🔄 Rescanning from height {} ({})", new_height, new_hash);
        self.save_chain_head(new_height, &new_hash)?;

        if let Some(mut header) = superseded {
            header.fork = true;
            self.new_block_notify(header).await;
        }

        Ok((new_height, new_hash))
    }

    /// Re-extract the last `count` scanned heights; chunk data can arrive
    /// after the header was first seen. The head is not moved.
    async fn rescan_recent_blocks(&self, count: u64) {
        let head = match self.context.storage.chain_head.get() {
            Ok(Some(head)) => head,
            Ok(None) => return,
            Err(e) => {
                error!("❌ Failed to load chain head for tail re-scan: {}", e);
                return;
            }
        };

        let start = head.height.saturating_sub(count.saturating_sub(1)).max(1);
        info!("🔁 Re-scanning recent heights {}..={}", start, head.height);

        for height in start..=head.height {
            if let Err(e) = self.extract_block_at(height).await {
                warn!("⚠️ Re-scan of height {} failed: {}", height, e);
            }
        }
    }

    /// Fetch a block and run the full extraction pipeline over it without
    /// touching the chain head.
    pub(crate) async fn extract_block_at(&self, height: u64) -> Result<Block> {
        let block = self
            .context
            .client
            .block_by_height(height)
            .await
            .with_context(|| format!("Failed to fetch block {}", height))?;
        self.batch_extract_transactions(&block).await?;
        Ok(block)
    }

    /// Rewind the scan cursor so the next pass resumes from `height`.
    pub async fn set_rescan_block_height(&self, height: u64) -> Result<()> {
        if height == 0 {
            bail!("Rescan height must be greater than 0");
        }

        let anchor = height - 1;
        let block = self
            .context
            .client
            .block_by_height(anchor)
            .await
            .with_context(|| format!("Failed to fetch anchor block {}", anchor))?;

        self.save_chain_head(anchor, &block.header.hash)?;
        info!("⏪ Scan cursor rewound, next pass resumes from {}", height);
        Ok(())
    }

    /// Height of the last fully scanned block, 0 before the first one.
    pub fn scanned_block_height(&self) -> u64 {
        match self.context.storage.chain_head.get() {
            Ok(Some(head)) => head.height,
            Ok(None) => 0,
            Err(e) => {
                error!("❌ Failed to read chain head: {}", e);
                0
            }
        }
    }

    /// Latest height the connected node reports, 0 when unreachable.
    pub async fn global_max_block_height(&self) -> u64 {
        match self.context.client.chain_status().await {
            Ok(status) => status.sync_info.latest_block_height,
            Err(e) => {
                error!("❌ Failed to fetch chain status: {}", e);
                0
            }
        }
    }

    /// Confirmed balances for `addresses`, formatted in whole units.
    pub async fn balance_by_address(&self, addresses: &[String]) -> Result<Vec<Balance>> {
        let mut balances = Vec::with_capacity(addresses.len());
        for address in addresses {
            let account = self
                .context
                .client
                .account_view(address)
                .await
                .with_context(|| format!("Failed to query account {}", address))?;
            balances.push(Balance {
                symbol: self.context.symbol().to_string(),
                address: address.clone(),
                balance: format_amount(&account.amount, self.context.config.decimals)?,
            });
        }
        Ok(balances)
    }
}

#[async_trait]
impl Scanner for NearBlockScanner {
    async fn scan_block(&self, height: u64) -> Result<()> {
        let block = match self.context.client.block_by_height(height).await {
            Ok(block) => block,
            Err(e) => {
                error!("❌ Failed to fetch block {}: {}", height, e);
                self.context.metrics.record_block_fetch_failure();
                let record =
                    UnscanRecord::new(height, "", format!("block fetch failed: {}", e));
                if let Err(save_err) = self.context.storage.unscan.save(&record) {
                    error!(
                        "❌ Failed to save unscan record at height {}: {}",
                        height, save_err
                    );
                }
                return Err(e.context(format!("Failed to fetch block {}", height)));
            }
        };

        self.batch_extract_transactions(&block).await?;
        self.new_block_notify(self.parse_header(&block, false)).await;
        Ok(())
    }

    async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("🔄 Scanner loop started");

        loop {
            if self.is_scanning() {
                if let Err(e) = self.scan_block_task().await {
                    error!("❌ Scan pass failed: {}", e);
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("🛑 Shutdown signal received, stopping scanner gracefully...");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_secs(self.context.config.period_secs)) => {}
            }
        }

        info!("📊 Final scanned height: {}", self.scanned_block_height());
        info!("👋 Scanner stopped gracefully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewound_height_is_two_below_mismatch() {
        // head 99, mismatch fetching 100 -> back to 98
        assert_eq!(rewound_height(100), 98);
        assert_eq!(rewound_height(1_000_000), 999_998);
    }

    #[test]
    fn test_rewound_height_floors_at_one() {
        assert_eq!(rewound_height(3), 1);
        assert_eq!(rewound_height(2), 1);
        assert_eq!(rewound_height(1), 1);
        assert_eq!(rewound_height(0), 1);
    }
}
