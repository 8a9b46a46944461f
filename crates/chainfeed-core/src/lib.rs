//! chainfeed-core — block sync engine that turns Scorum node history into typed events.
//!
//! # Architecture
//!
//! ```text
//! ProviderBuilder → Provider::start → SyncLoop
//!                                        ├── ChainClient  (node access, see chainfeed-rpc)
//!                                        ├── RetryPolicy  (bounded fixed-delay retries)
//!                                        ├── Classifier   (operation → event)
//!                                        └── channels     (reversible / irreversible / errors)
//! ```

pub mod builder;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod operation;
pub mod provider;
pub mod retry;
mod sync;
pub mod types;

pub use builder::ProviderBuilder;
pub use classifier::{Classifier, Converter};
pub use client::ChainClient;
pub use config::ProviderConfig;
pub use error::{ClientError, FeedError};
pub use event::{Event, EventType, ParseEventTypeError};
pub use operation::{Operation, OperationKind};
pub use provider::{Provider, Subscription, SyncHandle, SyncState};
pub use retry::{try_do, Attempt, RetryError, RetryPolicy};
pub use types::{Block, BlockContext, ChainProperties, RawBlock};
