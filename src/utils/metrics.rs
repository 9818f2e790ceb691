/// Event sink for the scan loop. Call sites stay unconditional; runs
/// with metrics disabled get the no-op sink instead.
pub trait ScannerMetrics: Send + Sync {
    fn record_block_scanned(&self, height: u64);
    fn record_block_fetch_failure(&self);
    fn record_fork_detected(&self, height: u64);
    fn record_records_extracted(&self, count: usize);
    fn record_extract_failure(&self);
    fn record_unscan_backlog(&self, pending: usize);
}

#[derive(Default)]
pub struct NoopScannerMetrics;

impl NoopScannerMetrics {
    pub fn new() -> Self {
        Self
    }
}

impl ScannerMetrics for NoopScannerMetrics {
    fn record_block_scanned(&self, _height: u64) {}

    fn record_block_fetch_failure(&self) {}

    fn record_fork_detected(&self, _height: u64) {}

    fn record_records_extracted(&self, _count: usize) {}

    fn record_extract_failure(&self) {}

    fn record_unscan_backlog(&self, _pending: usize) {}
}

pub struct PrometheusScannerMetrics {
    chain: String,
}

impl PrometheusScannerMetrics {
    pub fn new(chain: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
        }
    }
}

impl ScannerMetrics for PrometheusScannerMetrics {
    fn record_block_scanned(&self, height: u64) {
        let chain = self.chain.clone();
        metrics::counter!(
            "scanner_blocks_scanned_total",
            1,
            "chain" => chain.clone()
        );
        metrics::gauge!(
            "scanner_head_height",
            height as f64,
            "chain" => chain
        );
    }

    fn record_block_fetch_failure(&self) {
        let chain = self.chain.clone();
        metrics::counter!(
            "scanner_block_fetch_failure_total",
            1,
            "chain" => chain
        );
    }

    fn record_fork_detected(&self, height: u64) {
        let chain = self.chain.clone();
        metrics::counter!(
            "scanner_fork_total",
            1,
            "chain" => chain.clone()
        );
        metrics::gauge!(
            "scanner_fork_height",
            height as f64,
            "chain" => chain
        );
    }

    fn record_records_extracted(&self, count: usize) {
        if count == 0 {
            return;
        }
        let chain = self.chain.clone();
        metrics::counter!(
            "scanner_records_extracted_total",
            count as u64,
            "chain" => chain
        );
    }

    fn record_extract_failure(&self) {
        let chain = self.chain.clone();
        metrics::counter!(
            "scanner_extract_failure_total",
            1,
            "chain" => chain
        );
    }

    fn record_unscan_backlog(&self, pending: usize) {
        let chain = self.chain.clone();
        metrics::gauge!(
            "scanner_unscan_backlog",
            pending as f64,
            "chain" => chain
        );
    }
}
