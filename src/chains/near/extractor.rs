use std::sync::Arc;

use tracing::warn;

use crate::chains::near::context::NearScannerContext;
use crate::chains::near::models::TransactionView;
use crate::core::observer::ScanTargetResolver;
use crate::core::table::{
    AccountRecords, ExtractOutcome, ExtractRecord, ExtractResult, RecordDirection, TX_TYPE_FEE,
    TX_TYPE_TRANSFER,
};

/// Leg index of the principal transfer within a transaction.
const TRANSFER_LEG_INDEX: u64 = 0;
/// Leg index of the synthetic fee record.
const FEE_LEG_INDEX: u64 = 1;

/// Turns single transactions into per-account transfer and fee records
/// for every watched account they touch.
#[derive(Clone)]
pub struct TransferExtractor {
    context: NearScannerContext,
    targets: Arc<dyn ScanTargetResolver>,
}

impl TransferExtractor {
    pub fn new(context: NearScannerContext, targets: Arc<dyn ScanTargetResolver>) -> Self {
        Self { context, targets }
    }

    /// Fetch one transaction's detail and extract its records. Failures
    /// are captured in the result, never raised; the pipeline consumer
    /// turns them into retry markers.
    pub async fn extract_transaction(
        &self,
        block_height: u64,
        block_hash: &str,
        block_time: i64,
        tx_hash: &str,
        signer_id: &str,
    ) -> ExtractResult {
        if tx_hash.is_empty() {
            return ExtractResult {
                tx_id: String::new(),
                block_height,
                block_hash: block_hash.to_string(),
                outcome: ExtractOutcome::Failed {
                    reason: "transaction hash is empty".to_string(),
                },
            };
        }

        let detail = match self.context.client.transaction(tx_hash, signer_id).await {
            Ok(detail) => detail,
            Err(e) => {
                warn!("⚠️ Failed to fetch transaction {}: {}", tx_hash, e);
                return ExtractResult {
                    tx_id: tx_hash.to_string(),
                    block_height,
                    block_hash: block_hash.to_string(),
                    outcome: ExtractOutcome::Failed {
                        reason: e.to_string(),
                    },
                };
            }
        };

        ExtractResult {
            tx_id: tx_hash.to_string(),
            block_height,
            block_hash: block_hash.to_string(),
            outcome: ExtractOutcome::Extracted(self.build_records(
                block_height,
                block_hash,
                block_time,
                &detail,
            )),
        }
    }

    /// Build the record legs for every watched account involved. An empty
    /// map means the transaction is irrelevant to watched accounts, which
    /// is still a successful extraction.
    fn build_records(
        &self,
        block_height: u64,
        block_hash: &str,
        block_time: i64,
        detail: &TransactionView,
    ) -> AccountRecords {
        let tx = &detail.transaction;
        let mut data = AccountRecords::new();

        if tx.actions.is_empty() {
            return data;
        }

        let amount = tx.transfer_deposit().unwrap_or("0").to_string();
        let fee = detail.transaction_outcome.outcome.gas_burnt.to_string();

        let make = |direction: RecordDirection, amount: String, tx_type: u8, index: u64| {
            let address = match direction {
                RecordDirection::Input => tx.signer_id.clone(),
                RecordDirection::Output => tx.receiver_id.clone(),
            };
            ExtractRecord {
                sid: ExtractRecord::gen_sid(direction, &tx.hash, self.context.symbol(), "", index),
                tx_id: tx.hash.clone(),
                direction,
                address,
                from: tx.signer_id.clone(),
                to: tx.receiver_id.clone(),
                amount,
                symbol: self.context.symbol().to_string(),
                tx_type,
                is_memo_fee: tx_type == TX_TYPE_FEE,
                block_height,
                block_hash: block_hash.to_string(),
                confirm_time: block_time,
                index,
            }
        };

        let sender_key = self.targets.resolve(&tx.signer_id);
        let receiver_key = self.targets.resolve(&tx.receiver_id);

        match (sender_key, receiver_key) {
            // Self-transfer within one watched account: both legs plus
            // one fee leg under the same key.
            (Some(key), Some(other)) if key == other => {
                let records = data.entry(key).or_default();
                records.push(make(
                    RecordDirection::Input,
                    amount.clone(),
                    TX_TYPE_TRANSFER,
                    TRANSFER_LEG_INDEX,
                ));
                records.push(make(
                    RecordDirection::Output,
                    amount,
                    TX_TYPE_TRANSFER,
                    TRANSFER_LEG_INDEX,
                ));
                records.push(make(
                    RecordDirection::Input,
                    fee,
                    TX_TYPE_FEE,
                    FEE_LEG_INDEX,
                ));
            }
            (sender_key, receiver_key) => {
                if let Some(key) = sender_key {
                    let records = data.entry(key).or_default();
                    records.push(make(
                        RecordDirection::Input,
                        amount.clone(),
                        TX_TYPE_TRANSFER,
                        TRANSFER_LEG_INDEX,
                    ));
                    records.push(make(
                        RecordDirection::Input,
                        fee.clone(),
                        TX_TYPE_FEE,
                        FEE_LEG_INDEX,
                    ));
                }
                if let Some(key) = receiver_key {
                    let records = data.entry(key).or_default();
                    records.push(make(
                        RecordDirection::Output,
                        amount.clone(),
                        TX_TYPE_TRANSFER,
                        TRANSFER_LEG_INDEX,
                    ));
                    records.push(make(
                        RecordDirection::Input,
                        fee.clone(),
                        TX_TYPE_FEE,
                        FEE_LEG_INDEX,
                    ));
                }
            }
        }

        data
    }
}
