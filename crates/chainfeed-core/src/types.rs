//! Shared types for the sync pipeline.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::operation::Operation;

/// Wire format of block timestamps (`2018-08-03T10:12:43`, no zone).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parse a node timestamp.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
}

// ─── ChainProperties ─────────────────────────────────────────────────────────

/// Chain head and finality as reported by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainProperties {
    pub head_block_number: u32,
    pub last_irreversible_block_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl ChainProperties {
    pub fn new(head_block_number: u32, last_irreversible_block_number: u32) -> Self {
        Self {
            head_block_number,
            last_irreversible_block_number,
            ..Default::default()
        }
    }
}

// ─── RawBlock ────────────────────────────────────────────────────────────────

/// A block as returned by the history API, before classification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    pub block_id: String,
    /// Timestamp in [`TIMESTAMP_FORMAT`]; parsed by the engine.
    pub timestamp: String,
    /// Operations in execution order.
    pub operations: Vec<Operation>,
}

// ─── BlockContext ────────────────────────────────────────────────────────────

/// Block-level data handed to the classifier alongside each operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockContext {
    pub block_id: String,
    pub block_num: u32,
    pub timestamp: NaiveDateTime,
}

// ─── Block ───────────────────────────────────────────────────────────────────

/// A processed block: the events that matched the subscriber's type set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub block_num: u32,
    pub timestamp: NaiveDateTime,
    /// Events in operation order.
    pub events: Vec<Event>,
}

impl Block {
    pub fn new(block_num: u32, timestamp: NaiveDateTime) -> Self {
        Self {
            block_num,
            timestamp,
            events: Vec::new(),
        }
    }

    /// The synthetic block 0 used for the genesis account backfill.
    pub fn genesis(events: Vec<Event>) -> Self {
        Self {
            block_num: 0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH.naive_utc(),
            events,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
