use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use near_block_scanner::{
    chains::near::{client::NearClient, context::NearScannerContext, scanner::NearBlockScanner},
    cli::{Cli, Commands},
    config::AppConfig,
    core::{
        observer::{BlockScanObserver, ScanTargetResolver},
        scanner::Scanner,
        table::{BlockHeader, ExtractRecord},
    },
    storage::{manager::ScannerStorageManager, rocksdb::RocksDBStorage, traits::KVStorage},
    utils::{
        logger::init_logger,
        metrics::{NoopScannerMetrics, PrometheusScannerMetrics, ScannerMetrics},
    },
};
use tokio::sync::broadcast;
use tracing::{error, info};

/// Watched accounts from config; the account id doubles as the internal
/// account key.
struct ConfigScanTargets {
    accounts: HashSet<String>,
}

impl ScanTargetResolver for ConfigScanTargets {
    fn resolve(&self, address: &str) -> Option<String> {
        self.accounts
            .contains(address)
            .then(|| address.to_string())
    }
}

/// Logs every scan notification; stands in for a wallet backend.
struct LogObserver;

#[async_trait]
impl BlockScanObserver for LogObserver {
    async fn new_block_notify(&self, header: &BlockHeader) {
        if header.fork {
            info!(
                "⛓️ Block {} superseded by fork ({})",
                header.height, header.hash
            );
        } else {
            info!("🧱 New block {} ({})", header.height, header.hash);
        }
    }

    async fn block_extract_data_notify(
        &self,
        account_key: &str,
        record: &ExtractRecord,
    ) -> Result<()> {
        info!(
            "💰 {} {} {} -> {} amount {} (tx {})",
            account_key,
            record.direction.as_str(),
            record.from,
            record.to,
            record.amount,
            record.tx_id
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let cfg = AppConfig::load(&args.config)?;
    init_logger(
        &cfg.logging.level,
        cfg.logging.to_file,
        &cfg.logging.file_path,
    );

    info!("✅ Configuration loaded from {}", args.config.display());
    info!(symbol = %cfg.scanner.symbol, "Chain symbol");
    info!(rpc_url = %cfg.rpc.url, "RPC node");
    info!(
        watch_accounts = cfg.scanner.watch_accounts.len(),
        "Watched accounts"
    );

    let metrics: Arc<dyn ScannerMetrics> = if cfg.metrics.enable {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], cfg.metrics.prometheus_exporter_port))
            .install()?;
        info!(
            "📈 Prometheus exporter listening on :{}",
            cfg.metrics.prometheus_exporter_port
        );
        Arc::new(PrometheusScannerMetrics::new(cfg.scanner.symbol.clone()))
    } else {
        Arc::new(NoopScannerMetrics::new())
    };

    let storage = Arc::new(RocksDBStorage::new(&cfg.storage.path)?);
    storage.init()?;
    info!("✅ Storage initialized at: {}", cfg.storage.path);

    let storage_manager = Arc::new(ScannerStorageManager::new(
        storage.clone(),
        cfg.scanner.symbol.clone(),
    ));
    let client = Arc::new(NearClient::new(&cfg.rpc)?);
    let context = NearScannerContext::new(
        Arc::new(cfg.scanner.clone()),
        storage_manager,
        metrics,
        client,
    );

    let targets = Arc::new(ConfigScanTargets {
        accounts: cfg.scanner.watch_accounts.iter().cloned().collect(),
    });
    let scanner = NearBlockScanner::new(context, targets);
    scanner.add_observer(Arc::new(LogObserver));

    match args.command.unwrap_or(Commands::Run) {
        Commands::Run => {
            let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);

            let shutdown_tx_sigint = shutdown_tx.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl+C: {}", e);
                    return;
                }

                info!("📡 Ctrl+C received, shutting down");
                let _ = shutdown_tx_sigint.send(());
            });

            #[cfg(unix)]
            {
                use tokio::signal::unix::{SignalKind, signal};

                let shutdown_tx_sigterm = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                        sigterm.recv().await;
                        info!("📡 SIGTERM received, shutting down");
                        let _ = shutdown_tx_sigterm.send(());
                    }
                });
            }

            info!("🚀 Starting NEAR block scanner...");
            info!("💡 Press Ctrl+C to stop gracefully");

            scanner.run(shutdown_rx).await?;

            storage.flush()?;
            info!("✨ Scanner shut down cleanly");
        }
        Commands::ScanBlock { height } => {
            info!("🔍 Scanning single block {}", height);
            scanner.scan_block(height).await?;
        }
        Commands::SetRescanHeight { height } => {
            scanner.set_rescan_block_height(height).await?;
        }
    }

    Ok(())
}
