//! Chain operations as delivered by the node.
//!
//! On the wire every operation is a two-element array `["vote", { .. }]`.
//! Kinds the classifier knows about get a typed payload; everything else is
//! kept verbatim as [`Operation::Other`] so a new node release never breaks
//! deserialization.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountCreateOperation {
    pub fee: String,
    pub creator: String,
    pub new_account_name: String,
    pub json_metadata: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountCreateByCommitteeOperation {
    pub creator: String,
    pub new_account_name: String,
    pub json_metadata: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountCreateWithDelegationOperation {
    pub fee: String,
    pub delegation: String,
    pub creator: String,
    pub new_account_name: String,
    pub json_metadata: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteOperation {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    /// Negative weight is a flag.
    pub weight: i16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentOperation {
    /// Empty for top-level posts.
    pub parent_author: String,
    pub parent_permlink: String,
    pub author: String,
    pub permlink: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeleteCommentOperation {
    pub author: String,
    pub permlink: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateGameOperation {
    pub uuid: String,
    pub moderator: String,
    pub json_metadata: String,
    pub start_time: String,
    pub auto_resolve_delay_sec: u32,
    pub game: Value,
    pub markets: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancelGameOperation {
    pub uuid: String,
    pub moderator: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateGameStartTimeOperation {
    pub uuid: String,
    pub moderator: String,
    pub start_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostGameResultsOperation {
    pub uuid: String,
    pub moderator: String,
    pub wincases: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostBetOperation {
    pub uuid: String,
    pub better: String,
    pub game_uuid: String,
    pub wincase: Value,
    pub odds: Value,
    pub stake: String,
    pub live: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CancelPendingBetsOperation {
    pub bet_uuids: Vec<String>,
    pub better: String,
}

/// Virtual operation produced by the node when two bets are matched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetsMatchedOperation {
    pub better1: String,
    pub better2: String,
    pub bet1_uuid: String,
    pub bet2_uuid: String,
    pub matched_stake1: String,
    pub matched_stake2: String,
    pub matched_bet_uuid: String,
}

/// Virtual operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStatusChangedOperation {
    pub game_uuid: String,
    pub old_status: String,
    pub new_status: String,
}

/// Virtual operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetResolvedOperation {
    pub game_uuid: String,
    pub better: String,
    pub bet_uuid: String,
    pub income: String,
    pub kind: String,
}

/// Virtual operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BetCancelledOperation {
    pub game_uuid: String,
    pub better: String,
    pub bet_uuid: String,
    pub stake: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferOperation {
    pub from: String,
    pub to: String,
    /// Asset string, e.g. `"10.000000000 SCR"`.
    pub amount: String,
    pub memo: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateNftOperation {
    pub owner: String,
    pub uuid: String,
    pub name: String,
    pub initial_power: i32,
    pub json_metadata: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateNftMetadataOperation {
    pub moderator: String,
    pub uuid: String,
    pub json_metadata: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateGameRoundOperation {
    pub owner: String,
    pub uuid: String,
    pub verification_key: String,
    pub seed: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateGameRoundResultOperation {
    pub owner: String,
    pub uuid: String,
    pub proof: String,
    pub vrf: String,
    pub result: i32,
}

// ─── Operation enum ──────────────────────────────────────────────────────────

macro_rules! operations {
    ($($variant:ident($payload:ty) => $name:literal,)*) => {
        /// A single on-chain operation.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Operation {
            $($variant($payload),)*
            /// Any operation kind without a typed payload.
            Other { name: String, payload: Value },
        }

        /// Payload-free discriminant of [`Operation`], used as a registration key.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum OperationKind {
            $($variant,)*
            Other,
        }

        impl Operation {
            pub fn kind(&self) -> OperationKind {
                match self {
                    $(Self::$variant(_) => OperationKind::$variant,)*
                    Self::Other { .. } => OperationKind::Other,
                }
            }

            /// The node's name for this operation (e.g. `"vote"`).
            pub fn name(&self) -> &str {
                match self {
                    $(Self::$variant(_) => $name,)*
                    Self::Other { name, .. } => name,
                }
            }

            /// Build an operation from its wire name and JSON payload.
            ///
            /// Unknown names never fail; a known name with a malformed payload does.
            pub fn from_parts(name: &str, payload: Value) -> Result<Self, serde_json::Error> {
                Ok(match name {
                    $($name => Self::$variant(serde_json::from_value(payload)?),)*
                    _ => Self::Other {
                        name: name.to_string(),
                        payload,
                    },
                })
            }

            fn payload(&self) -> Result<Value, serde_json::Error> {
                match self {
                    $(Self::$variant(op) => serde_json::to_value(op),)*
                    Self::Other { payload, .. } => Ok(payload.clone()),
                }
            }
        }
    };
}

operations! {
    AccountCreate(AccountCreateOperation) => "account_create",
    AccountCreateByCommittee(AccountCreateByCommitteeOperation) => "account_create_by_committee",
    AccountCreateWithDelegation(AccountCreateWithDelegationOperation) => "account_create_with_delegation",
    Vote(VoteOperation) => "vote",
    Comment(CommentOperation) => "comment",
    DeleteComment(DeleteCommentOperation) => "delete_comment",
    CreateGame(CreateGameOperation) => "create_game",
    CancelGame(CancelGameOperation) => "cancel_game",
    UpdateGameStartTime(UpdateGameStartTimeOperation) => "update_game_start_time",
    PostGameResults(PostGameResultsOperation) => "post_game_results",
    PostBet(PostBetOperation) => "post_bet",
    CancelPendingBets(CancelPendingBetsOperation) => "cancel_pending_bets",
    BetsMatched(BetsMatchedOperation) => "bets_matched",
    GameStatusChanged(GameStatusChangedOperation) => "game_status_changed",
    BetResolved(BetResolvedOperation) => "bet_resolved",
    BetCancelled(BetCancelledOperation) => "bet_cancelled",
    Transfer(TransferOperation) => "transfer",
    CreateNft(CreateNftOperation) => "create_nft",
    UpdateNftMetadata(UpdateNftMetadataOperation) => "update_nft_metadata",
    CreateGameRound(CreateGameRoundOperation) => "create_game_round",
    UpdateGameRoundResult(UpdateGameRoundResultOperation) => "update_game_round_result",
}

impl Serialize for Operation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let payload = self.payload().map_err(serde::ser::Error::custom)?;
        (self.name(), payload).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Operation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (name, payload) = <(String, Value)>::deserialize(deserializer)?;
        Self::from_parts(&name, payload).map_err(serde::de::Error::custom)
    }
}
