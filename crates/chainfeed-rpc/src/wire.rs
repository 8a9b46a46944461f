//! Response shapes of the history API.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use chainfeed_core::{ClientError, Operation, RawBlock};

/// One entry of a `get_blocks` response: `[num, block]`.
#[derive(Debug, Deserialize)]
pub struct HistoryEntry(pub u32, pub HistoryBlock);

#[derive(Debug, Deserialize)]
pub struct HistoryBlock {
    #[serde(default)]
    pub block_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub operations: Vec<HistoryOperation>,
}

/// An applied operation; only the `[name, payload]` pair is used.
#[derive(Debug, Deserialize)]
pub struct HistoryOperation {
    pub op: Operation,
}

impl From<HistoryBlock> for RawBlock {
    fn from(b: HistoryBlock) -> Self {
        RawBlock {
            block_id: b.block_id,
            timestamp: b.timestamp,
            operations: b.operations.into_iter().map(|o| o.op).collect(),
        }
    }
}

/// Decode a `get_blocks` result into blocks keyed by number.
pub fn decode_blocks(result: Value) -> Result<HashMap<u32, RawBlock>, ClientError> {
    let entries: Vec<HistoryEntry> = serde_json::from_value(result)?;
    Ok(entries
        .into_iter()
        .map(|HistoryEntry(num, block)| (num, block.into()))
        .collect())
}
