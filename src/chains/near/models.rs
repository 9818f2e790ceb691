use serde::{Deserialize, Serialize};

/// `status` RPC payload (only the fields the scanner consumes).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct NodeStatus {
    #[serde(default)]
    pub chain_id: String,
    pub sync_info: SyncInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SyncInfo {
    #[serde(default)]
    pub latest_block_hash: String,
    pub latest_block_height: u64,
    #[serde(default)]
    pub latest_block_time: String,
    #[serde(default)]
    pub syncing: bool,
}

/// `block` RPC payload: header plus chunk references.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Block {
    #[serde(default)]
    pub author: String,
    pub header: BlockHeaderView,
    #[serde(default)]
    pub chunks: Vec<ChunkHeaderView>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct BlockHeaderView {
    pub height: u64,
    pub hash: String,
    pub prev_hash: String,
    /// Nanoseconds since epoch, as the node reports it
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub epoch_id: String,
    #[serde(default)]
    pub gas_price: String,
}

impl BlockHeaderView {
    /// Block time in unix seconds.
    pub fn timestamp_secs(&self) -> u64 {
        self.timestamp / 1_000_000_000
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ChunkHeaderView {
    pub chunk_hash: String,
    #[serde(default)]
    pub prev_block_hash: String,
    #[serde(default)]
    pub height_created: u64,
    #[serde(default)]
    pub height_included: u64,
    #[serde(default)]
    pub gas_used: u64,
    #[serde(default)]
    pub gas_limit: u64,
}

/// `chunk` RPC payload.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Chunk {
    #[serde(default)]
    pub author: String,
    pub header: ChunkHeaderView,
    #[serde(default)]
    pub transactions: Vec<ChunkTransaction>,
}

/// A transaction as carried inside a chunk.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ChunkTransaction {
    #[serde(default)]
    pub signer_id: String,
    #[serde(default)]
    pub public_key: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default)]
    pub actions: Vec<ActionView>,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub hash: String,
}

impl ChunkTransaction {
    /// Deposit of the leading transfer action, if the transaction starts
    /// with one.
    pub fn transfer_deposit(&self) -> Option<&str> {
        match self.actions.first()? {
            ActionView::Object(body) => body.transfer.as_ref().map(|t| t.deposit.as_str()),
            ActionView::Name(_) => None,
        }
    }
}

/// Actions come back either as bare kind names ("CreateAccount") or as
/// single-key objects; only transfers carry data the scanner uses.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum ActionView {
    Object(ActionBody),
    Name(String),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ActionBody {
    #[serde(rename = "Transfer", default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<TransferAction>,
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TransferAction {
    pub deposit: String,
}

/// `tx` RPC payload: the transaction and its execution outcome.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TransactionView {
    pub transaction: ChunkTransaction,
    pub transaction_outcome: TransactionOutcomeView,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct TransactionOutcomeView {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub block_hash: String,
    pub outcome: OutcomeView,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct OutcomeView {
    #[serde(default)]
    pub gas_burnt: u64,
    #[serde(default)]
    pub tokens_burnt: String,
    #[serde(default)]
    pub executor_id: String,
}

/// `query view_account` payload.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AccountView {
    pub amount: String,
    #[serde(default)]
    pub locked: String,
    #[serde(default)]
    pub storage_usage: u64,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub block_hash: String,
}

/// `query view_access_key` payload; nonces live per access key on NEAR.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AccessKeyView {
    pub nonce: u64,
    #[serde(default)]
    pub permission: serde_json::Value,
    #[serde(default)]
    pub block_height: u64,
    #[serde(default)]
    pub block_hash: String,
}
