#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use near_block_scanner::{
    chains::near::{
        client::{NearRpc, TX_NOT_FOUND_REASON},
        context::NearScannerContext,
        models::{
            AccountView, ActionBody, ActionView, Block, BlockHeaderView, Chunk, ChunkHeaderView,
            ChunkTransaction, NodeStatus, OutcomeView, SyncInfo, TransactionOutcomeView,
            TransactionView, TransferAction,
        },
        scanner::NearBlockScanner,
    },
    config::ScannerConfig,
    core::{
        observer::{BlockScanObserver, ScanTargetResolver},
        table::{BlockHeader, ExtractRecord},
    },
    storage::{manager::ScannerStorageManager, rocksdb::RocksDBStorage, traits::KVStorage},
    utils::metrics::{NoopScannerMetrics, ScannerMetrics},
};
use tempfile::TempDir;

/// In-memory chain the scanner runs against. Blocks, chunks and
/// transaction details are seeded per test; `status_queue` lets a test
/// script successive `status` answers, falling back to `latest_height`
/// once drained.
#[derive(Default)]
pub struct MockChain {
    pub latest_height: Mutex<u64>,
    pub status_queue: Mutex<VecDeque<u64>>,
    pub blocks: Mutex<HashMap<u64, Block>>,
    pub chunks: Mutex<HashMap<String, Chunk>>,
    pub transactions: Mutex<HashMap<String, TransactionView>>,
    pub accounts: Mutex<HashMap<String, AccountView>>,
    pub failing_blocks: Mutex<HashSet<u64>>,
    pub failing_txs: Mutex<HashSet<String>>,
    pub fail_status: AtomicBool,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_latest(&self, height: u64) {
        *self.latest_height.lock().unwrap() = height;
    }

    /// Queue one `status` answer ahead of the `latest_height` fallback.
    pub fn push_status(&self, height: u64) {
        self.status_queue.lock().unwrap().push_back(height);
    }

    pub fn seed_empty_block(&self, height: u64, hash: &str, prev_hash: &str) {
        self.blocks
            .lock()
            .unwrap()
            .insert(height, mk_block(height, hash, prev_hash, &[]));
    }

    /// Seed a block carrying `txs` in a single chunk, registering each
    /// transaction's detail for the `tx` RPC as well.
    pub fn seed_block_with_txs(
        &self,
        height: u64,
        hash: &str,
        prev_hash: &str,
        txs: Vec<ChunkTransaction>,
    ) {
        let chunk_hash = format!("chunk-{}", hash);

        for tx in &txs {
            self.transactions
                .lock()
                .unwrap()
                .insert(tx.hash.clone(), mk_detail(tx));
        }

        self.chunks.lock().unwrap().insert(
            chunk_hash.clone(),
            Chunk {
                author: "validator.mock.near".to_string(),
                header: ChunkHeaderView {
                    chunk_hash: chunk_hash.clone(),
                    height_included: height,
                    ..Default::default()
                },
                transactions: txs,
            },
        );

        self.blocks.lock().unwrap().insert(
            height,
            mk_block(height, hash, prev_hash, std::slice::from_ref(&chunk_hash)),
        );
    }

    /// Make the `block` RPC fail for `height` until healed.
    pub fn fail_block(&self, height: u64) {
        self.failing_blocks.lock().unwrap().insert(height);
    }

    pub fn heal_block(&self, height: u64) {
        self.failing_blocks.lock().unwrap().remove(&height);
    }

    /// Make the `tx` RPC fail for `tx_hash` with a transport-style
    /// error until healed.
    pub fn fail_tx(&self, tx_hash: &str) {
        self.failing_txs.lock().unwrap().insert(tx_hash.to_string());
    }

    pub fn heal_tx(&self, tx_hash: &str) {
        self.failing_txs.lock().unwrap().remove(tx_hash);
    }

    /// Drop a transaction's detail so the `tx` RPC reports it unknown.
    pub fn forget_tx(&self, tx_hash: &str) {
        self.transactions.lock().unwrap().remove(tx_hash);
    }

    /// (Re-)register a transaction's detail.
    pub fn push_tx(&self, tx: &ChunkTransaction) {
        self.transactions
            .lock()
            .unwrap()
            .insert(tx.hash.clone(), mk_detail(tx));
    }

    pub fn set_account(&self, account_id: &str, amount: &str) {
        self.accounts.lock().unwrap().insert(
            account_id.to_string(),
            AccountView {
                amount: amount.to_string(),
                ..Default::default()
            },
        );
    }

    /// Highest number of `tx` RPC calls observed in flight at once.
    pub fn max_concurrent_tx_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NearRpc for MockChain {
    async fn chain_status(&self) -> Result<NodeStatus> {
        if self.fail_status.load(Ordering::SeqCst) {
            bail!("status endpoint unavailable");
        }

        let height = self
            .status_queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.latest_height.lock().unwrap());

        Ok(NodeStatus {
            chain_id: "mocknet".to_string(),
            sync_info: SyncInfo {
                latest_block_height: height,
                ..Default::default()
            },
        })
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        if self.failing_blocks.lock().unwrap().contains(&height) {
            bail!("node unavailable for height {}", height);
        }

        let found = self.blocks.lock().unwrap().get(&height).cloned();
        match found {
            Some(block) => Ok(block),
            None => bail!("block {} not found", height),
        }
    }

    async fn chunk(&self, chunk_hash: &str) -> Result<Chunk> {
        let found = self.chunks.lock().unwrap().get(chunk_hash).cloned();
        match found {
            Some(chunk) => Ok(chunk),
            None => bail!("chunk {} not found", chunk_hash),
        }
    }

    async fn transaction(&self, tx_hash: &str, signer_id: &str) -> Result<TransactionView> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        // Give overlapping fetches a chance to actually overlap.
        tokio::time::sleep(Duration::from_millis(2)).await;

        let broken = self.failing_txs.lock().unwrap().contains(tx_hash);
        let found = self.transactions.lock().unwrap().get(tx_hash).cloned();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if broken {
            bail!("connection reset while fetching {}", tx_hash);
        }

        match found {
            Some(detail) => Ok(detail),
            None => bail!("{}: {}, {}", TX_NOT_FOUND_REASON, tx_hash, signer_id),
        }
    }

    async fn account_view(&self, account_id: &str) -> Result<AccountView> {
        let found = self.accounts.lock().unwrap().get(account_id).cloned();
        match found {
            Some(account) => Ok(account),
            None => bail!("account {} does not exist", account_id),
        }
    }

    async fn access_key_nonce(&self, _account_id: &str, _public_key: &str) -> Result<u64> {
        Ok(0)
    }
}

pub fn mk_block(height: u64, hash: &str, prev_hash: &str, chunk_hashes: &[String]) -> Block {
    Block {
        author: "validator.mock.near".to_string(),
        header: BlockHeaderView {
            height,
            hash: hash.to_string(),
            prev_hash: prev_hash.to_string(),
            // nanoseconds, as the node reports it
            timestamp: 1_724_000_000_000_000_000 + height * 1_000_000_000,
            ..Default::default()
        },
        chunks: chunk_hashes
            .iter()
            .map(|chunk_hash| ChunkHeaderView {
                chunk_hash: chunk_hash.clone(),
                height_included: height,
                ..Default::default()
            })
            .collect(),
    }
}

pub fn mk_tx(hash: &str, signer: &str, receiver: &str, deposit: Option<&str>) -> ChunkTransaction {
    let actions = match deposit {
        Some(deposit) => vec![ActionView::Object(ActionBody {
            transfer: Some(TransferAction {
                deposit: deposit.to_string(),
            }),
            other: serde_json::Map::new(),
        })],
        None => Vec::new(),
    };

    ChunkTransaction {
        signer_id: signer.to_string(),
        receiver_id: receiver.to_string(),
        nonce: 1,
        hash: hash.to_string(),
        actions,
        ..Default::default()
    }
}

pub fn mk_detail(tx: &ChunkTransaction) -> TransactionView {
    TransactionView {
        transaction: tx.clone(),
        transaction_outcome: TransactionOutcomeView {
            id: tx.hash.clone(),
            block_hash: String::new(),
            outcome: OutcomeView {
                gas_burnt: 424_555_062_500,
                tokens_burnt: "42455506250000000000".to_string(),
                executor_id: tx.signer_id.clone(),
            },
        },
    }
}

/// Observer that records everything it is notified about.
#[derive(Default)]
pub struct RecordingObserver {
    pub headers: Mutex<Vec<BlockHeader>>,
    pub records: Mutex<Vec<(String, ExtractRecord)>>,
    pub fail_next_notify: AtomicBool,
}

impl RecordingObserver {
    /// Reject exactly one upcoming record delivery.
    pub fn fail_next(&self) {
        self.fail_next_notify.store(true, Ordering::SeqCst);
    }

    pub fn headers(&self) -> Vec<BlockHeader> {
        self.headers.lock().unwrap().clone()
    }

    pub fn records(&self) -> Vec<(String, ExtractRecord)> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlockScanObserver for RecordingObserver {
    async fn new_block_notify(&self, header: &BlockHeader) {
        self.headers.lock().unwrap().push(header.clone());
    }

    async fn block_extract_data_notify(
        &self,
        account_key: &str,
        record: &ExtractRecord,
    ) -> Result<()> {
        if self.fail_next_notify.swap(false, Ordering::SeqCst) {
            bail!("downstream rejected the record");
        }
        self.records
            .lock()
            .unwrap()
            .push((account_key.to_string(), record.clone()));
        Ok(())
    }
}

pub struct StaticTargets(pub HashSet<String>);

impl ScanTargetResolver for StaticTargets {
    fn resolve(&self, address: &str) -> Option<String> {
        self.0.contains(address).then(|| address.to_string())
    }
}

pub fn targets(accounts: &[&str]) -> Arc<StaticTargets> {
    Arc::new(StaticTargets(
        accounts.iter().map(|account| account.to_string()).collect(),
    ))
}

pub struct TestHarness {
    pub chain: Arc<MockChain>,
    pub storage: Arc<ScannerStorageManager>,
    pub observer: Arc<RecordingObserver>,
    pub scanner: NearBlockScanner,
    _temp: TempDir,
}

pub fn build_scanner(watch: &[&str]) -> Result<TestHarness> {
    build_scanner_with_config(watch, ScannerConfig::default())
}

pub fn build_scanner_with_config(watch: &[&str], config: ScannerConfig) -> Result<TestHarness> {
    let temp = TempDir::new()?;
    let db_path = temp.path().join("rocksdb").to_string_lossy().to_string();
    let storage = Arc::new(RocksDBStorage::new(&db_path)?);
    storage.init()?;

    let storage_manager = Arc::new(ScannerStorageManager::new(
        storage.clone(),
        config.symbol.clone(),
    ));

    let metrics: Arc<dyn ScannerMetrics> = Arc::new(NoopScannerMetrics::new());
    let chain = Arc::new(MockChain::new());

    let context = NearScannerContext::new(
        Arc::new(config),
        Arc::clone(&storage_manager),
        metrics,
        chain.clone(),
    );

    let observer = Arc::new(RecordingObserver::default());
    let scanner = NearBlockScanner::new(context, targets(watch));
    scanner.add_observer(observer.clone());

    Ok(TestHarness {
        chain,
        storage: storage_manager,
        observer,
        scanner,
        _temp: temp,
    })
}
