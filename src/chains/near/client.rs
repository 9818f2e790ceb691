use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;

use crate::chains::near::models::{
    AccessKeyView, AccountView, Block, Chunk, NodeStatus, TransactionView,
};
use crate::config::RpcConfig;
use crate::utils::retry::{RetryConfig, retry_async};

/// Reason signature for transactions the node no longer knows about.
/// The rescanner purges retry markers carrying it, since the condition
/// never resolves.
pub const TX_NOT_FOUND_REASON: &str = "cannot find this transaction";

/// The chain operations the scanner consumes.
#[async_trait]
pub trait NearRpc: Send + Sync {
    async fn chain_status(&self) -> Result<NodeStatus>;

    async fn block_by_height(&self, height: u64) -> Result<Block>;

    async fn chunk(&self, chunk_hash: &str) -> Result<Chunk>;

    /// NEAR resolves transactions by (hash, signer). A `null` result is
    /// reported with the [`TX_NOT_FOUND_REASON`] signature.
    async fn transaction(&self, tx_hash: &str, signer_id: &str) -> Result<TransactionView>;

    async fn account_view(&self, account_id: &str) -> Result<AccountView>;

    async fn access_key_nonce(&self, account_id: &str, public_key: &str) -> Result<u64>;
}

/// JSON-RPC 2.0 client against a NEAR node.
pub struct NearClient {
    http: reqwest::Client,
    url: String,
    retry: RetryConfig,
}

impl NearClient {
    pub fn new(cfg: &RpcConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url: cfg.url.clone(),
            retry: RetryConfig {
                max_retries: Some(cfg.max_retries),
                base_delay: Duration::from_secs(1),
                exponential_backoff: true,
            },
        })
    }

    /// POST one JSON-RPC call. Transport failures are retried with
    /// backoff; node-side errors come back as `[code]message`.
    async fn call<P: Serialize, T: DeserializeOwned>(&self, method: &str, params: P) -> Result<T> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        debug!("📡 RPC {} -> {}", method, self.url);

        let http = &self.http;
        let url = self.url.as_str();
        let request = &payload;

        let body: serde_json::Value = retry_async(
            || async move {
                let response = http
                    .post(url)
                    .header("Content-Type", "application/json")
                    .json(request)
                    .send()
                    .await
                    .with_context(|| format!("RPC request failed: {}", method))?;

                let status = response.status();
                if !status.is_success() {
                    bail!("RPC {} returned HTTP {}", method, status);
                }

                response
                    .json::<serde_json::Value>()
                    .await
                    .with_context(|| format!("Failed to decode RPC response: {}", method))
            },
            self.retry.clone(),
        )
        .await?;

        if let Some(err) = rpc_error(&body) {
            bail!("RPC {} failed: {}", method, err);
        }

        let result = body
            .get("result")
            .cloned()
            .ok_or_else(|| anyhow!("RPC {} response has no result", method))?;

        serde_json::from_value(result)
            .with_context(|| format!("Unexpected result shape for RPC: {}", method))
    }
}

/// Extract the JSON-RPC error object as "[code]message", if present.
fn rpc_error(body: &serde_json::Value) -> Option<String> {
    let err = body.get("error")?;
    if err.is_null() {
        return None;
    }

    let code = err.get("code").and_then(|c| c.as_i64()).unwrap_or_default();
    let message = err
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("unknown error");
    Some(format!("[{}]{}", code, message))
}

#[async_trait]
impl NearRpc for NearClient {
    async fn chain_status(&self) -> Result<NodeStatus> {
        self.call("status", json!([])).await
    }

    async fn block_by_height(&self, height: u64) -> Result<Block> {
        self.call("block", json!({"block_id": height})).await
    }

    async fn chunk(&self, chunk_hash: &str) -> Result<Chunk> {
        self.call("chunk", json!([chunk_hash])).await
    }

    async fn transaction(&self, tx_hash: &str, signer_id: &str) -> Result<TransactionView> {
        let result: serde_json::Value = self.call("tx", json!([tx_hash, signer_id])).await?;
        if result.is_null() {
            bail!("{}: {}, {}", TX_NOT_FOUND_REASON, tx_hash, signer_id);
        }
        serde_json::from_value(result).context("Unexpected result shape for RPC: tx")
    }

    async fn account_view(&self, account_id: &str) -> Result<AccountView> {
        self.call(
            "query",
            json!({
                "request_type": "view_account",
                "finality": "final",
                "account_id": account_id,
            }),
        )
        .await
    }

    async fn access_key_nonce(&self, account_id: &str, public_key: &str) -> Result<u64> {
        let view: AccessKeyView = self
            .call(
                "query",
                json!({
                    "request_type": "view_access_key",
                    "finality": "final",
                    "account_id": account_id,
                    "public_key": public_key,
                }),
            )
            .await?;
        Ok(view.nonce)
    }
}
