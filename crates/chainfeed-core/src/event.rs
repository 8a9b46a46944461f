//! Application-level events produced by the classifier.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::operation::{
    BetCancelledOperation, BetResolvedOperation, BetsMatchedOperation, CancelGameOperation,
    CancelPendingBetsOperation, CreateGameOperation, CreateGameRoundOperation, CreateNftOperation,
    GameStatusChangedOperation, PostBetOperation, PostGameResultsOperation, TransferOperation,
    UpdateGameRoundResultOperation, UpdateGameStartTimeOperation, UpdateNftMetadataOperation,
};

// ─── EventType ───────────────────────────────────────────────────────────────

/// Stable discriminant of an [`Event`], used for subscription filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Unknown,
    AccountCreate,
    Post,
    Comment,
    Vote,
    Flag,
    DeleteComment,
    CreateGame,
    CancelGame,
    UpdateGameStartTime,
    PostGameResults,
    PostBet,
    CancelPendingBets,
    BetsMatched,
    GameStatusChanged,
    BetResolved,
    BetCancelled,
    Transfer,
    CreateNft,
    UpdateNftMetadata,
    CreateGameRound,
    UpdateGameRoundResult,
}

impl EventType {
    pub const ALL: [EventType; 22] = [
        Self::Unknown,
        Self::AccountCreate,
        Self::Post,
        Self::Comment,
        Self::Vote,
        Self::Flag,
        Self::DeleteComment,
        Self::CreateGame,
        Self::CancelGame,
        Self::UpdateGameStartTime,
        Self::PostGameResults,
        Self::PostBet,
        Self::CancelPendingBets,
        Self::BetsMatched,
        Self::GameStatusChanged,
        Self::BetResolved,
        Self::BetCancelled,
        Self::Transfer,
        Self::CreateNft,
        Self::UpdateNftMetadata,
        Self::CreateGameRound,
        Self::UpdateGameRoundResult,
    ];

    /// The snake_case name used in config files and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::AccountCreate => "account_create",
            Self::Post => "post",
            Self::Comment => "comment",
            Self::Vote => "vote",
            Self::Flag => "flag",
            Self::DeleteComment => "delete_comment",
            Self::CreateGame => "create_game",
            Self::CancelGame => "cancel_game",
            Self::UpdateGameStartTime => "update_game_start_time",
            Self::PostGameResults => "post_game_results",
            Self::PostBet => "post_bet",
            Self::CancelPendingBets => "cancel_pending_bets",
            Self::BetsMatched => "bets_matched",
            Self::GameStatusChanged => "game_status_changed",
            Self::BetResolved => "bet_resolved",
            Self::BetCancelled => "bet_cancelled",
            Self::Transfer => "transfer",
            Self::CreateNft => "create_nft",
            Self::UpdateNftMetadata => "update_nft_metadata",
            Self::CreateGameRound => "create_game_round",
            Self::UpdateGameRoundResult => "update_game_round_result",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unrecognised event type name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct ParseEventTypeError(pub String);

impl FromStr for EventType {
    type Err = ParseEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseEventTypeError(s.to_string()))
    }
}

// ─── Event payloads ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreateEvent {
    pub account: String,
}

/// Payload of both [`Event::Vote`] and [`Event::Flag`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteEvent {
    pub voter: String,
    pub author: String,
    pub permlink: String,
    pub weight: i16,
}

/// A top-level post (comment without a parent author).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostEvent {
    pub permlink: String,
    pub parent_permlink: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEvent {
    pub permlink: String,
    pub parent_author: String,
    pub parent_permlink: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub json_metadata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCommentEvent {
    pub author: String,
    pub permlink: String,
}

/// An operation the classifier has no converter for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownEvent {
    /// The node's operation name.
    pub operation: String,
    pub block_id: String,
    pub block_num: u32,
    pub timestamp: NaiveDateTime,
}

// ─── Event ───────────────────────────────────────────────────────────────────

/// A classified chain operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
    AccountCreate(AccountCreateEvent),
    Vote(VoteEvent),
    Flag(VoteEvent),
    Post(PostEvent),
    Comment(CommentEvent),
    DeleteComment(DeleteCommentEvent),
    CreateGame(CreateGameOperation),
    CancelGame(CancelGameOperation),
    UpdateGameStartTime(UpdateGameStartTimeOperation),
    PostGameResults(PostGameResultsOperation),
    PostBet(PostBetOperation),
    CancelPendingBets(CancelPendingBetsOperation),
    BetsMatched(BetsMatchedOperation),
    GameStatusChanged(GameStatusChangedOperation),
    BetResolved(BetResolvedOperation),
    BetCancelled(BetCancelledOperation),
    Transfer(TransferOperation),
    CreateNft(CreateNftOperation),
    UpdateNftMetadata(UpdateNftMetadataOperation),
    CreateGameRound(CreateGameRoundOperation),
    UpdateGameRoundResult(UpdateGameRoundResultOperation),
    Unknown(UnknownEvent),
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::AccountCreate(_) => EventType::AccountCreate,
            Self::Vote(_) => EventType::Vote,
            Self::Flag(_) => EventType::Flag,
            Self::Post(_) => EventType::Post,
            Self::Comment(_) => EventType::Comment,
            Self::DeleteComment(_) => EventType::DeleteComment,
            Self::CreateGame(_) => EventType::CreateGame,
            Self::CancelGame(_) => EventType::CancelGame,
            Self::UpdateGameStartTime(_) => EventType::UpdateGameStartTime,
            Self::PostGameResults(_) => EventType::PostGameResults,
            Self::PostBet(_) => EventType::PostBet,
            Self::CancelPendingBets(_) => EventType::CancelPendingBets,
            Self::BetsMatched(_) => EventType::BetsMatched,
            Self::GameStatusChanged(_) => EventType::GameStatusChanged,
            Self::BetResolved(_) => EventType::BetResolved,
            Self::BetCancelled(_) => EventType::BetCancelled,
            Self::Transfer(_) => EventType::Transfer,
            Self::CreateNft(_) => EventType::CreateNft,
            Self::UpdateNftMetadata(_) => EventType::UpdateNftMetadata,
            Self::CreateGameRound(_) => EventType::CreateGameRound,
            Self::UpdateGameRoundResult(_) => EventType::UpdateGameRoundResult,
            Self::Unknown(_) => EventType::Unknown,
        }
    }

    pub fn account_create(account: impl Into<String>) -> Self {
        Self::AccountCreate(AccountCreateEvent {
            account: account.into(),
        })
    }
}
