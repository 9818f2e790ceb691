use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{
    chains::near::client::NearRpc, config::ScannerConfig,
    storage::manager::ScannerStorageManager, utils::metrics::ScannerMetrics,
};

/// Shared wiring handed to the scanner, pipeline and rescanner.
#[derive(Clone)]
pub struct NearScannerContext {
    pub config: Arc<ScannerConfig>,
    pub storage: Arc<ScannerStorageManager>,
    pub metrics: Arc<dyn ScannerMetrics>,
    pub client: Arc<dyn NearRpc>,
    /// Caps concurrently extracting transactions within a block.
    pub extract_semaphore: Arc<Semaphore>,
}

impl NearScannerContext {
    pub fn new(
        config: Arc<ScannerConfig>,
        storage: Arc<ScannerStorageManager>,
        metrics: Arc<dyn ScannerMetrics>,
        client: Arc<dyn NearRpc>,
    ) -> Self {
        let extract_semaphore = Arc::new(Semaphore::new(config.max_extracting_size.max(1)));
        Self {
            config,
            storage,
            metrics,
            client,
            extract_semaphore,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.config.symbol
    }
}
