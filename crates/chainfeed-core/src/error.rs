//! Error types for the chainfeed pipeline.

use thiserror::Error;

/// Errors returned by a [`ChainClient`](crate::client::ChainClient) implementation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed (connection refused, reset, bad status, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out.
    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// JSON-RPC error object returned by the node.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The node answered with something we could not decode.
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Returns `true` for transport failures (connection, timeout).
    ///
    /// Every client error is retried; this only tags the retry log.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout { .. })
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}

/// Errors reported on a subscription's error stream.
///
/// Exactly one of these is delivered before the engine stops.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("{operation} failed after {attempts} attempts: {source}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        source: ClientError,
    },

    #[error("Invalid timestamp {value:?} in block {block_num}: {source}")]
    Timestamp {
        block_num: u32,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

impl FeedError {
    /// Returns `true` if the engine gave up because the retry budget ran out.
    pub fn is_retry_exhausted(&self) -> bool {
        matches!(self, Self::RetryExhausted { .. })
    }
}
