//! The node-facing collaborator consumed by the sync engine.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::types::{ChainProperties, RawBlock};

/// Read access to a chain node.
///
/// The engine calls these methods sequentially from a single task; an
/// implementation only has to be safe for repeated, non-overlapping use.
#[async_trait]
pub trait ChainClient: Send + Sync + 'static {
    /// Current head and last irreversible block numbers.
    async fn chain_properties(&self) -> Result<ChainProperties, ClientError>;

    /// Up to `count` blocks ending at `end_block` (inclusive), keyed by number.
    ///
    /// The node produces them newest first; callers must not rely on any
    /// iteration order of the returned map.
    async fn blocks(&self, end_block: u32, count: u32)
        -> Result<HashMap<u32, RawBlock>, ClientError>;

    /// Up to `limit` account names in lexical order starting at `lower_bound`.
    ///
    /// The bound itself is included in the page when it names an account.
    async fn lookup_accounts(&self, lower_bound: &str, limit: u16)
        -> Result<Vec<String>, ClientError>;
}
