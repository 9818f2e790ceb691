use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::chains::near::models::Block;
use crate::chains::near::scanner::NearBlockScanner;
use crate::core::table::{AccountRecords, ExtractOutcome, ExtractResult, UnscanRecord};

impl NearBlockScanner {
    /// Extract every transaction in `block` through the bounded worker
    /// pool and deliver the results to observers. The chain head is not
    /// touched here; the error return is advisory - each failed unit is
    /// already persisted as a retry marker.
    pub(crate) async fn batch_extract_transactions(&self, block: &Block) -> Result<()> {
        let height = block.header.height;
        let block_hash = block.header.hash.clone();
        let block_time = block.header.timestamp_secs() as i64;

        let (transactions, mut failed) = self.collect_chunk_transactions(block).await;
        let total = transactions.len();

        if total == 0 && failed == 0 {
            debug!("📭 Block {} has no transactions", height);
            return Ok(());
        }

        let (sender, mut receiver) =
            mpsc::channel::<ExtractResult>(self.context.config.max_extracting_size.max(1));

        // Producer runs on its own task so the consumer below drains the
        // channel while workers are still being admitted; otherwise a full
        // channel would wedge the permit holders.
        let semaphore = self.context.extract_semaphore.clone();
        let extractor = self.extractor.clone();
        tokio::spawn(async move {
            for (tx_hash, signer_id) in transactions {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };
                let extractor = extractor.clone();
                let sender = sender.clone();
                let block_hash = block_hash.clone();

                tokio::spawn(async move {
                    let result = extractor
                        .extract_transaction(height, &block_hash, block_time, &tx_hash, &signer_id)
                        .await;
                    let _ = sender.send(result).await;
                    drop(permit);
                });
            }
        });

        // Single consumer; the block is done only once every transaction
        // has been accounted for, notified or recorded as unscanned.
        let mut done = 0usize;
        while done < total {
            let Some(result) = receiver.recv().await else {
                break;
            };
            done += 1;

            match result.outcome {
                ExtractOutcome::Extracted(ref data) if data.is_empty() => {}
                ExtractOutcome::Extracted(ref data) => {
                    match self.notify_extract_data(height, data).await {
                        Ok(delivered) => {
                            self.context.metrics.record_records_extracted(delivered);
                        }
                        Err(e) => {
                            error!(
                                "❌ Delivery failed for tx {} at height {}: {}",
                                result.tx_id, height, e
                            );
                            self.context.metrics.record_extract_failure();
                            failed += 1;
                        }
                    }
                }
                ExtractOutcome::Failed { ref reason } => {
                    let record = UnscanRecord::new(height, &result.tx_id, reason.clone());
                    if let Err(e) = self.context.storage.unscan.save(&record) {
                        error!(
                            "❌ Failed to save unscan record at height {}: {}",
                            height, e
                        );
                    }
                    self.context.metrics.record_extract_failure();
                    failed += 1;
                }
            }
        }

        if failed > 0 {
            bail!(
                "block {}: {} of {} extraction units failed",
                height,
                failed,
                total
            );
        }

        debug!("✅ Block {} extracted, {} transactions drained", height, total);
        Ok(())
    }

    /// Fetch all chunks of `block` concurrently and flatten their
    /// transactions to `(hash, signer)` work items. A failed chunk fetch
    /// becomes a block-level retry marker; the remaining chunks still
    /// contribute their transactions.
    async fn collect_chunk_transactions(&self, block: &Block) -> (Vec<(String, String)>, usize) {
        let height = block.header.height;
        let mut join_set = JoinSet::new();

        for chunk_ref in &block.chunks {
            let client = self.context.client.clone();
            let chunk_hash = chunk_ref.chunk_hash.clone();
            join_set.spawn(async move {
                let result = client.chunk(&chunk_hash).await;
                (chunk_hash, result)
            });
        }

        let mut transactions = Vec::new();
        let mut failed = 0usize;

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((_, Ok(chunk))) => {
                    for tx in chunk.transactions {
                        transactions.push((tx.hash, tx.signer_id));
                    }
                }
                Ok((chunk_hash, Err(e))) => {
                    error!("❌ Failed to fetch chunk {}: {}", chunk_hash, e);
                    let record = UnscanRecord::new(
                        height,
                        "",
                        format!("chunk {} fetch failed: {}", chunk_hash, e),
                    );
                    if let Err(e) = self.context.storage.unscan.save(&record) {
                        error!(
                            "❌ Failed to save unscan record at height {}: {}",
                            height, e
                        );
                    }
                    failed += 1;
                }
                Err(e) => {
                    error!("❌ Chunk fetch task failed to join: {}", e);
                    failed += 1;
                }
            }
        }

        (transactions, failed)
    }

    /// Fan a transaction's records out to every observer. Each failed
    /// delivery becomes a retry marker for the block; returns the number
    /// of records delivered when all of them went through.
    async fn notify_extract_data(&self, height: u64, data: &AccountRecords) -> Result<usize> {
        let observers = self.observers_snapshot();
        let mut delivered = 0usize;
        let mut failures = 0usize;

        for (account_key, records) in data {
            for record in records {
                for observer in &observers {
                    if let Err(e) = observer.block_extract_data_notify(account_key, record).await {
                        error!(
                            "❌ Extract data notify failed for {}: {}",
                            account_key, e
                        );
                        let unscan = UnscanRecord::new(
                            height,
                            &record.tx_id,
                            format!("extract data notify failed: {}", e),
                        );
                        if let Err(e) = self.context.storage.unscan.save(&unscan) {
                            error!(
                                "❌ Failed to save unscan record at height {}: {}",
                                height, e
                            );
                        }
                        failures += 1;
                    }
                }
                delivered += 1;
            }
        }

        if failures > 0 {
            bail!(
                "{} of {} record deliveries failed at height {}",
                failures,
                delivered,
                height
            );
        }
        Ok(delivered)
    }
}
