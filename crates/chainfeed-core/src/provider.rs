//! Provider — the subscription surface of the sync engine.
//!
//! [`Provider::start`] spawns one background task that polls the node and
//! returns immediately with three channels:
//!
//! ```text
//! Provider::start ──spawn──► SyncLoop ──► blocks        (reversible, as soon as seen)
//!                                     ├─► irreversible  (once finalized)
//!                                     └─► errors        (at most one, then the task ends)
//! ```
//!
//! Every channel holds a single item. The sync task waits for the consumer,
//! so a consumer that stops reading one of the block streams stalls the sync.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::classifier::Classifier;
use crate::client::ChainClient;
use crate::config::ProviderConfig;
use crate::error::FeedError;
use crate::event::EventType;
use crate::sync::SyncLoop;
use crate::types::Block;

/// Capacity of every output channel.
const CHANNEL_CAPACITY: usize = 1;

/// Runtime state of a sync task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Spawned, first iteration not reached yet.
    Starting,
    /// Synthesising block 0 from the existing account list.
    GenesisBackfill,
    /// Fetching and emitting blocks.
    Polling,
    /// At the chain head; sleeping until the next poll.
    CaughtUp,
    /// Cancelled or abandoned by the consumer; the task has exited.
    Draining,
    /// Stopped after reporting an error.
    Failed,
}

impl SyncState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Draining | Self::Failed)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::GenesisBackfill => write!(f, "genesis-backfill"),
            Self::Polling => write!(f, "polling"),
            Self::CaughtUp => write!(f, "caught-up"),
            Self::Draining => write!(f, "draining"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Streams returned by [`Provider::start`].
pub struct Subscription {
    /// Blocks as soon as they are seen (may later be reorganised away).
    pub blocks: mpsc::Receiver<Block>,
    /// Blocks at or below the last irreversible block.
    pub irreversible: mpsc::Receiver<Block>,
    /// The error that stopped the task, if any.
    pub errors: mpsc::Receiver<FeedError>,
    /// Control handle for the background task.
    pub handle: SyncHandle,
}

/// Control handle for a running sync task.
#[derive(Debug)]
pub struct SyncHandle {
    cancel: CancellationToken,
    state: watch::Receiver<SyncState>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Ask the task to stop at its next suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current state of the task.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// A receiver that observes every state transition.
    pub fn state_watch(&self) -> watch::Receiver<SyncState> {
        self.state.clone()
    }

    /// Returns `true` once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the task to exit.
    pub async fn join(self) -> Result<(), tokio::task::JoinError> {
        self.task.await
    }
}

/// Polls a chain node and republishes its operations as events.
pub struct Provider<C: ChainClient> {
    client: Arc<C>,
    config: ProviderConfig,
    classifier: Classifier,
}

impl<C: ChainClient> Provider<C> {
    pub fn new(client: C, config: ProviderConfig) -> Self {
        Self::with_classifier(Arc::new(client), config, Classifier::new())
    }

    pub fn with_classifier(client: Arc<C>, config: ProviderConfig, classifier: Classifier) -> Self {
        Self {
            client,
            config,
            classifier,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    /// Start syncing after block `from` (reversible) and `irreversible_from`.
    ///
    /// Only events whose type is in `event_types` are delivered. Starting at
    /// block 0 with [`EventType::AccountCreate`] requested first emits a
    /// synthetic block 0 listing every existing account.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(
        &self,
        from: u32,
        irreversible_from: u32,
        event_types: impl IntoIterator<Item = EventType>,
    ) -> Subscription {
        self.start_with_cancel(from, irreversible_from, event_types, CancellationToken::new())
    }

    /// Like [`start`](Self::start), stopping when `cancel` is cancelled.
    pub fn start_with_cancel(
        &self,
        from: u32,
        irreversible_from: u32,
        event_types: impl IntoIterator<Item = EventType>,
        cancel: CancellationToken,
    ) -> Subscription {
        let event_types: HashSet<EventType> = event_types.into_iter().collect();

        if irreversible_from > from {
            tracing::warn!(from, irreversible_from, "irreversible cursor is ahead of the reversible one");
        }
        tracing::info!(
            from,
            irreversible_from,
            event_types = event_types.len(),
            "Provider starting"
        );

        let (blocks_tx, blocks) = mpsc::channel(CHANNEL_CAPACITY);
        let (irreversible_tx, irreversible) = mpsc::channel(CHANNEL_CAPACITY);
        let (errors_tx, errors) = mpsc::channel(CHANNEL_CAPACITY);
        let (state_tx, state) = watch::channel(SyncState::Starting);

        let sync = SyncLoop {
            client: Arc::clone(&self.client),
            retry: self.config.retry_policy(),
            config: self.config.clone(),
            classifier: self.classifier.clone(),
            event_types,
            from,
            irreversible_from,
            blocks_tx,
            irreversible_tx,
            errors_tx,
            cancel: cancel.clone(),
            state: state_tx,
        };
        let task = tokio::spawn(sync.run());

        Subscription {
            blocks,
            irreversible,
            errors,
            handle: SyncHandle {
                cancel,
                state,
                task,
            },
        }
    }
}
