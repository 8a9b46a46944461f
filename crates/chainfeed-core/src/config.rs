//! Provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Options for a [`Provider`](crate::provider::Provider).
///
/// Every field is optional when deserializing; missing fields take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Poll interval when caught up with the head (milliseconds).
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,
    /// Maximum number of blocks requested per history call.
    #[serde(default = "default_blocks_history_max_limit")]
    pub blocks_history_max_limit: u32,
    /// Sleep between failed node calls (milliseconds).
    #[serde(default = "default_retry_timeout_ms")]
    pub retry_timeout_ms: u64,
    /// Extra attempts after a failed node call.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Emit blocks even when none of their events matched.
    #[serde(default)]
    pub provide_empty_blocks: bool,
}

fn default_sync_interval_ms() -> u64 {
    1_000
}

fn default_blocks_history_max_limit() -> u32 {
    100
}

fn default_retry_timeout_ms() -> u64 {
    10_000
}

fn default_retry_limit() -> u32 {
    3
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: default_sync_interval_ms(),
            blocks_history_max_limit: default_blocks_history_max_limit(),
            retry_timeout_ms: default_retry_timeout_ms(),
            retry_limit: default_retry_limit(),
            provide_empty_blocks: false,
        }
    }
}

impl ProviderConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    pub fn retry_timeout(&self) -> Duration {
        Duration::from_millis(self.retry_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_limit, self.retry_timeout())
    }

    /// Parse a JSON config document.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}
