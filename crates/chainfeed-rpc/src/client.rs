//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! Retries are left to the sync engine; this client reports each failure
//! once. Connection failures and timeouts map to `Http` / `Timeout`, node
//! error objects to `Rpc`, unreadable bodies to `Decode`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use chainfeed_core::{ChainClient, ChainProperties, ClientError, RawBlock};

use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::wire::decode_blocks;

/// Configuration for [`HttpChainClient`].
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub request_timeout: Duration,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Scorum node client speaking JSON-RPC over HTTP.
pub struct HttpChainClient {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
    next_id: AtomicU64,
}

impl HttpChainClient {
    /// Create a new client for the given JSON-RPC endpoint URL.
    pub fn new(url: impl Into<String>, config: HttpClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            url: url.into(),
            http,
            request_timeout: config.request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(url, HttpClientConfig::default())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Invoke `api.method(args)` and decode the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        api: &str,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, ClientError> {
        let value = self.call_raw(api, method, args).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn call_raw(&self, api: &str, method: &str, args: Vec<Value>) -> Result<Value, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::call(id, api, method, args);
        tracing::trace!(id, api, method, url = %self.url, "sending request");

        let resp = self.send_once(&req).await?;
        if resp.id != req.id {
            tracing::debug!(sent = %req.id, received = %resp.id, method, "response id mismatch");
        }
        Ok(resp.into_result()?)
    }

    async fn send_once(&self, req: &JsonRpcRequest) -> Result<JsonRpcResponse, ClientError> {
        let resp = self
            .http
            .post(&self.url)
            .json(req)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Http(format!("HTTP {status}: {body}")));
        }

        let body = resp.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice::<JsonRpcResponse>(&body)?)
    }

    fn transport_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout {
                ms: self.request_timeout.as_millis() as u64,
            }
        } else {
            ClientError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn chain_properties(&self) -> Result<ChainProperties, ClientError> {
        self.call("chain_api", "get_chain_properties", vec![]).await
    }

    async fn blocks(&self, end_block: u32, count: u32) -> Result<HashMap<u32, RawBlock>, ClientError> {
        let result = self
            .call_raw("blockchain_history_api", "get_blocks", vec![json!(end_block), json!(count)])
            .await?;
        decode_blocks(result)
    }

    async fn lookup_accounts(&self, lower_bound: &str, limit: u16) -> Result<Vec<String>, ClientError> {
        self.call("database_api", "lookup_accounts", vec![json!(lower_bound), json!(limit)])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_with_defaults() {
        let client = HttpChainClient::default_for("https://testnet.scorum.work").unwrap();
        assert_eq!(client.url(), "https://testnet.scorum.work");
        assert_eq!(client.request_timeout, Duration::from_secs(30));
    }

    #[tokio::test]
    async fn unreachable_node_is_transient() {
        let client = HttpChainClient::new(
            "http://127.0.0.1:9",
            HttpClientConfig {
                request_timeout: Duration::from_millis(500),
            },
        )
        .unwrap();
        let err = client.chain_properties().await.unwrap_err();
        assert!(err.is_retryable(), "unexpected {err:?}");
    }

    #[test]
    fn chain_properties_decode_from_node_shape() {
        let props: ChainProperties = serde_json::from_value(json!({
            "chain_id": "d3c1f19a4947c296446583f988c43fd1a83818fabaf3454a0020198cb361ebd2",
            "head_block_id": "0021e1a0",
            "head_block_number": 2220448,
            "last_irreversible_block_number": 2220430,
            "time": "2018-08-03T10:12:46",
            "current_witness": "witness-b"
        }))
        .unwrap();
        assert_eq!(props.head_block_number, 2220448);
        assert_eq!(props.last_irreversible_block_number, 2220430);
        assert_eq!(props.time.as_deref(), Some("2018-08-03T10:12:46"));
    }
}
