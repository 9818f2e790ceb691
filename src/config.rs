use anyhow::Result;
use config as config_loader;
use dotenvy::dotenv;
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration, deserialized from the TOML file plus
/// `SCANNER__`-prefixed environment overrides.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub rpc: RpcConfig,
    pub storage: StorageConfig,
    pub scanner: ScannerConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// NEAR node endpoint settings.
#[derive(Debug, Deserialize, Clone)]
pub struct RpcConfig {
    pub url: String,
    #[serde(default = "RpcConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "RpcConfig::default_max_retries")]
    pub max_retries: u32,
}

impl RpcConfig {
    fn default_timeout_secs() -> u64 {
        15
    }
    fn default_max_retries() -> u32 {
        3
    }
}

/// Where the RocksDB data directory lives.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
}

/// Knobs for the scan loop and extraction stage.
#[derive(Debug, Deserialize, Clone)]
pub struct ScannerConfig {
    #[serde(default = "ScannerConfig::default_symbol")]
    pub symbol: String,

    /// Fractional digits of the native asset (24 for yoctoNEAR)
    #[serde(default = "ScannerConfig::default_decimals")]
    pub decimals: u32,

    /// Upper bound on concurrently extracting transactions per block
    #[serde(default = "ScannerConfig::default_max_extracting_size")]
    pub max_extracting_size: usize,

    /// Seconds between scan passes
    #[serde(default = "ScannerConfig::default_period_secs")]
    pub period_secs: u64,

    /// Heights re-extracted unconditionally at the end of each pass,
    /// 0 disables the tail re-scan
    #[serde(default)]
    pub rescan_last_block_count: u64,

    /// Accounts whose transfers are extracted
    #[serde(default)]
    pub watch_accounts: Vec<String>,
}

impl ScannerConfig {
    fn default_symbol() -> String {
        "NEAR".to_string()
    }
    fn default_decimals() -> u32 {
        24
    }
    fn default_max_extracting_size() -> usize {
        10
    }
    fn default_period_secs() -> u64 {
        5
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            symbol: Self::default_symbol(),
            decimals: Self::default_decimals(),
            max_extracting_size: Self::default_max_extracting_size(),
            period_secs: Self::default_period_secs(),
            rescan_last_block_count: 0,
            watch_accounts: Vec::new(),
        }
    }
}

/// Tracing output settings: level filter plus optional rolling file.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    #[serde(default = "LoggingConfig::default_to_file")]
    pub to_file: bool,
    #[serde(default = "LoggingConfig::default_file_path")]
    pub file_path: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".into()
    }
    fn default_to_file() -> bool {
        true
    }
    fn default_file_path() -> String {
        "./logs/near-scanner.log".into()
    }
}

/// Prometheus exporter settings.
#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "MetricsConfig::default_enable")]
    pub enable: bool,
    #[serde(default = "MetricsConfig::default_prometheus_exporter_port")]
    pub prometheus_exporter_port: u16,
}

impl MetricsConfig {
    fn default_enable() -> bool {
        true
    }
    fn default_prometheus_exporter_port() -> u16 {
        9100
    }
}

impl AppConfig {
    /// Read the TOML file at `path`, then layer `SCANNER__SECTION__KEY`
    /// environment variables on top. A missing file is an error rather
    /// than a silent fall-through to defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        dotenv().ok();

        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {:?}", path);
        }

        let settings = config_loader::Config::builder()
            .add_source(config_loader::File::from(path.to_path_buf()))
            .add_source(config_loader::Environment::with_prefix("SCANNER").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
