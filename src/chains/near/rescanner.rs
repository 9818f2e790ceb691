use std::collections::BTreeSet;

use tracing::{error, info, warn};

use crate::chains::near::client::TX_NOT_FOUND_REASON;
use crate::chains::near::scanner::NearBlockScanner;

impl NearBlockScanner {
    /// Retry every block that previously failed extraction or delivery.
    /// A height's retry markers are only cleared after a clean pass; the
    /// whole block is re-derived rather than retrying single
    /// transactions. Finishes with the permanent-failure purge.
    pub async fn rescan_failed_records(&self) {
        let records = match self.context.storage.unscan.all() {
            Ok(records) => records,
            Err(e) => {
                error!("❌ Failed to load unscan records: {}", e);
                return;
            }
        };
        self.context.metrics.record_unscan_backlog(records.len());
        if records.is_empty() {
            return;
        }

        let heights: BTreeSet<u64> = records.iter().map(|r| r.block_height).collect();
        info!(
            "🔁 Rescanning {} failed heights ({} markers)",
            heights.len(),
            records.len()
        );

        for height in heights {
            if height == 0 {
                continue;
            }

            match self.extract_block_at(height).await {
                Ok(_) => match self.context.storage.unscan.delete_by_height(height) {
                    Ok(removed) => {
                        info!(
                            "✅ Height {} rescanned, cleared {} retry markers",
                            height, removed
                        );
                    }
                    Err(e) => {
                        error!(
                            "❌ Failed to clear retry markers at height {}: {}",
                            height, e
                        );
                    }
                },
                Err(e) => {
                    warn!("⚠️ Rescan of height {} still failing: {}", height, e);
                }
            }
        }

        self.purge_unresolvable_records();
    }

    /// Drop retry markers whose reason carries the node's
    /// transaction-not-found signature; retrying those can never succeed.
    fn purge_unresolvable_records(&self) {
        let records = match self.context.storage.unscan.all() {
            Ok(records) => records,
            Err(e) => {
                error!("❌ Failed to load unscan records for purge: {}", e);
                return;
            }
        };

        for record in records {
            if !record.reason.contains(TX_NOT_FOUND_REASON) {
                continue;
            }

            match self.context.storage.unscan.delete_by_id(&record.id) {
                Ok(true) => {
                    info!(
                        "🧹 Purged unresolvable marker at height {} (tx {})",
                        record.block_height, record.tx_id
                    );
                }
                Ok(false) => {}
                Err(e) => {
                    error!("❌ Failed to purge marker {}: {}", record.id, e);
                }
            }
        }
    }
}
