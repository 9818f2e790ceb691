use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Transaction-type discriminator: principal movement.
pub const TX_TYPE_TRANSFER: u8 = 0;
/// Transaction-type discriminator: synthetic fee leg.
pub const TX_TYPE_FEE: u8 = 1;

/// Persisted scan cursor: the latest fully extracted block per symbol.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChainHead {
    /// Chain symbol (e.g. "NEAR")
    pub symbol: String,

    /// Height of the last block whose extraction fully drained
    pub height: u64,

    /// Hash at that height, used to detect forks on the next advance
    pub hash: String,

    /// Last updated UTC time
    pub updated_at: DateTime<Utc>,

    /// Data version number, for future schema compatibility upgrade
    pub version: u32,
}

impl ChainHead {
    pub fn new(symbol: &str, height: u64, hash: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            height,
            hash: hash.to_string(),
            updated_at: Utc::now(),
            version: crate::storage::schema::SCHEMA_VERSION,
        }
    }
}

/// Normalized block header, persisted per scanned height and pushed to
/// observers. `fork` is true when the header is re-announced because the
/// canonical chain replaced it.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BlockHeader {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    /// Unix seconds
    pub timestamp: u64,
    pub symbol: String,
    #[serde(default)]
    pub fork: bool,
}

/// Durable retry marker for a block (or a single transaction) whose
/// extraction or delivery failed.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UnscanRecord {
    /// hex(sha256("{height}_{tx_id}")); one live marker per unit of work
    pub id: String,
    pub block_height: u64,
    /// Empty when the whole block failed rather than one transaction
    pub tx_id: String,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl UnscanRecord {
    pub fn new(block_height: u64, tx_id: &str, reason: impl Into<String>) -> Self {
        let digest = Sha256::digest(format!("{}_{}", block_height, tx_id).as_bytes());
        Self {
            id: hex::encode(digest),
            block_height,
            tx_id: tx_id.to_string(),
            reason: reason.into(),
            created_at: Utc::now(),
        }
    }
}

/// Side of a transfer leg relative to the watched account.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecordDirection {
    /// Watched account spends (sender side)
    Input,
    /// Watched account receives
    Output,
}

impl RecordDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordDirection::Input => "input",
            RecordDirection::Output => "output",
        }
    }
}

/// One debit/credit leg extracted for a watched account.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ExtractRecord {
    /// Deterministic record identity; identical across rescans so
    /// downstream consumers can deduplicate deliveries
    pub sid: String,
    pub tx_id: String,
    pub direction: RecordDirection,
    /// The watched address this leg belongs to
    pub address: String,
    pub from: String,
    pub to: String,
    /// Raw base-unit amount (yoctoNEAR for the native asset)
    pub amount: String,
    pub symbol: String,
    /// `TX_TYPE_TRANSFER` or `TX_TYPE_FEE`
    pub tx_type: u8,
    pub is_memo_fee: bool,
    pub block_height: u64,
    pub block_hash: String,
    /// Unix seconds of the containing block
    pub confirm_time: i64,
    /// Leg index within the transaction (0 = transfer, 1 = fee)
    pub index: u64,
}

impl ExtractRecord {
    /// Derive the stable id for one leg from everything that identifies it.
    pub fn gen_sid(
        direction: RecordDirection,
        tx_id: &str,
        symbol: &str,
        contract_id: &str,
        index: u64,
    ) -> String {
        let input = format!(
            "{}_{}_{}_{}_{}",
            direction.as_str(),
            tx_id,
            symbol,
            contract_id,
            index
        );
        hex::encode(Sha256::digest(input.as_bytes()))
    }
}

/// Per-account records of one transaction, keyed by the internal account
/// key the target resolver returned.
pub type AccountRecords = HashMap<String, Vec<ExtractRecord>>;

/// Outcome of extracting a single transaction. Failure and per-account
/// data are mutually exclusive by construction.
#[derive(Debug, Clone)]
pub enum ExtractOutcome {
    /// Empty map when the transaction touches no watched account
    Extracted(AccountRecords),
    Failed { reason: String },
}

/// What one extraction worker hands back to the pipeline consumer.
#[derive(Debug, Clone)]
pub struct ExtractResult {
    pub tx_id: String,
    pub block_height: u64,
    pub block_hash: String,
    pub outcome: ExtractOutcome,
}

impl ExtractResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ExtractOutcome::Extracted(_))
    }
}

/// Confirmed account balance, formatted in whole units.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Balance {
    pub symbol: String,
    pub address: String,
    pub balance: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unscan_id_derivation() {
        let record = UnscanRecord::new(100, "abc", "timeout");
        let expected = hex::encode(Sha256::digest(b"100_abc"));
        assert_eq!(record.id, expected);

        // same unit of work, same id - different reason does not matter
        let again = UnscanRecord::new(100, "abc", "connection refused");
        assert_eq!(again.id, record.id);

        // block-level marker uses an empty tx id
        let block_level = UnscanRecord::new(100, "", "block fetch failed");
        assert_ne!(block_level.id, record.id);
    }

    #[test]
    fn test_sid_is_stable_and_distinct() {
        let a = ExtractRecord::gen_sid(RecordDirection::Input, "tx-1", "NEAR", "", 0);
        let b = ExtractRecord::gen_sid(RecordDirection::Input, "tx-1", "NEAR", "", 0);
        assert_eq!(a, b);

        let output = ExtractRecord::gen_sid(RecordDirection::Output, "tx-1", "NEAR", "", 0);
        assert_ne!(a, output);

        let fee = ExtractRecord::gen_sid(RecordDirection::Input, "tx-1", "NEAR", "", 1);
        assert_ne!(a, fee);

        let other_tx = ExtractRecord::gen_sid(RecordDirection::Input, "tx-2", "NEAR", "", 0);
        assert_ne!(a, other_tx);

        let contract = ExtractRecord::gen_sid(RecordDirection::Input, "tx-1", "NEAR", "usdt.near", 0);
        assert_ne!(a, contract);
    }

    #[test]
    fn test_extract_outcome_exclusivity() {
        let ok = ExtractResult {
            tx_id: "tx-1".to_string(),
            block_height: 100,
            block_hash: "hash-100".to_string(),
            outcome: ExtractOutcome::Extracted(AccountRecords::new()),
        };
        assert!(ok.is_success());

        let failed = ExtractResult {
            tx_id: "tx-2".to_string(),
            block_height: 100,
            block_hash: "hash-100".to_string(),
            outcome: ExtractOutcome::Failed {
                reason: "timeout".to_string(),
            },
        };
        assert!(!failed.is_success());
    }
}
