//! Fluent builder API for creating providers.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use chainfeed_core::ProviderBuilder;
//!
//! let provider = ProviderBuilder::new()
//!     .sync_interval(Duration::from_secs(1))
//!     .blocks_history_max_limit(100)
//!     .retry_timeout(Duration::from_secs(10))
//!     .retry_limit(3)
//!     .build(client);
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::classifier::Classifier;
use crate::client::ChainClient;
use crate::config::ProviderConfig;
use crate::provider::Provider;

/// Fluent builder for [`Provider`].
#[derive(Debug, Default)]
pub struct ProviderBuilder {
    config: ProviderConfig,
    classifier: Option<Classifier>,
}

impl ProviderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing config (e.g. one loaded from a file).
    pub fn from_config(config: ProviderConfig) -> Self {
        Self {
            config,
            classifier: None,
        }
    }

    /// Poll interval when caught up with the head.
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        self.config.sync_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Maximum blocks per history call.
    pub fn blocks_history_max_limit(mut self, limit: u32) -> Self {
        self.config.blocks_history_max_limit = limit;
        self
    }

    /// Sleep between failed node calls.
    pub fn retry_timeout(mut self, timeout: Duration) -> Self {
        self.config.retry_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Extra attempts after a failed node call.
    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.config.retry_limit = limit;
        self
    }

    pub fn provide_empty_blocks(mut self, provide: bool) -> Self {
        self.config.provide_empty_blocks = provide;
        self
    }

    /// Replace the default operation classifier.
    pub fn classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn build_config(self) -> ProviderConfig {
        self.config
    }

    pub fn build<C: ChainClient>(self, client: C) -> Provider<C> {
        self.build_shared(Arc::new(client))
    }

    /// Build around a client that is already shared.
    pub fn build_shared<C: ChainClient>(self, client: Arc<C>) -> Provider<C> {
        Provider::with_classifier(client, self.config, self.classifier.unwrap_or_default())
    }
}
