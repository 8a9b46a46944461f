//! Operation → event classification.
//!
//! A [`Classifier`] is a table from [`OperationKind`] to a converter function.
//! The table is built once and then only read, so a classifier can be cloned
//! into any number of engines and called from any thread.

use std::collections::HashMap;
use std::sync::Arc;

use crate::event::{
    CommentEvent, DeleteCommentEvent, Event, PostEvent, UnknownEvent, VoteEvent,
};
use crate::operation::{Operation, OperationKind};
use crate::types::BlockContext;

/// Converts one operation kind into an event.
///
/// A converter must only be registered for kinds it accepts; receiving any
/// other kind is a registration bug and panics.
pub type Converter = fn(&Operation, &BlockContext) -> Event;

/// Maps chain operations to application events.
#[derive(Clone)]
pub struct Classifier {
    converters: Arc<HashMap<OperationKind, Converter>>,
}

impl Classifier {
    /// A classifier with the default converter table.
    pub fn new() -> Self {
        let table: [(OperationKind, Converter); 21] = [
            (OperationKind::AccountCreate, to_account_create),
            (OperationKind::AccountCreateByCommittee, to_account_create),
            (OperationKind::AccountCreateWithDelegation, to_account_create),
            (OperationKind::Vote, to_vote),
            (OperationKind::Comment, to_comment),
            (OperationKind::DeleteComment, to_delete_comment),
            (OperationKind::CreateGame, to_create_game),
            (OperationKind::CancelGame, to_cancel_game),
            (OperationKind::UpdateGameStartTime, to_update_game_start_time),
            (OperationKind::PostGameResults, to_post_game_results),
            (OperationKind::PostBet, to_post_bet),
            (OperationKind::CancelPendingBets, to_cancel_pending_bets),
            (OperationKind::BetsMatched, to_bets_matched),
            (OperationKind::GameStatusChanged, to_game_status_changed),
            (OperationKind::BetResolved, to_bet_resolved),
            (OperationKind::BetCancelled, to_bet_cancelled),
            (OperationKind::Transfer, to_transfer),
            (OperationKind::CreateNft, to_create_nft),
            (OperationKind::UpdateNftMetadata, to_update_nft_metadata),
            (OperationKind::CreateGameRound, to_create_game_round),
            (OperationKind::UpdateGameRoundResult, to_update_game_round_result),
        ];
        Self {
            converters: Arc::new(table.into_iter().collect()),
        }
    }

    /// A classifier with no converters; every operation becomes [`Event::Unknown`].
    pub fn empty() -> Self {
        Self {
            converters: Arc::new(HashMap::new()),
        }
    }

    /// Register (or replace) the converter for `kind`.
    pub fn with_converter(mut self, kind: OperationKind, converter: Converter) -> Self {
        Arc::make_mut(&mut self.converters).insert(kind, converter);
        self
    }

    pub fn is_registered(&self, kind: OperationKind) -> bool {
        self.converters.contains_key(&kind)
    }

    /// Classify a single operation. Never fails.
    pub fn classify(&self, op: &Operation, ctx: &BlockContext) -> Event {
        match self.converters.get(&op.kind()) {
            Some(convert) => convert(op, ctx),
            None => Event::Unknown(UnknownEvent {
                operation: op.name().to_string(),
                block_id: ctx.block_id.clone(),
                block_num: ctx.block_num,
                timestamp: ctx.timestamp,
            }),
        }
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.converters.keys()).finish()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Converters ──────────────────────────────────────────────────────────────

fn wrong_kind(converter: &str, op: &Operation) -> ! {
    panic!(
        "classifier invariant violated: `{converter}` converter called with a `{}` operation",
        op.name()
    )
}

fn to_account_create(op: &Operation, _ctx: &BlockContext) -> Event {
    let account = match op {
        Operation::AccountCreate(v) => &v.new_account_name,
        Operation::AccountCreateByCommittee(v) => &v.new_account_name,
        Operation::AccountCreateWithDelegation(v) => &v.new_account_name,
        other => wrong_kind("account_create", other),
    };
    Event::account_create(account.as_str())
}

fn to_vote(op: &Operation, _ctx: &BlockContext) -> Event {
    let Operation::Vote(v) = op else {
        wrong_kind("vote", op)
    };
    let vote = VoteEvent {
        voter: v.voter.clone(),
        author: v.author.clone(),
        permlink: v.permlink.clone(),
        weight: v.weight,
    };
    if v.weight < 0 {
        Event::Flag(vote)
    } else {
        Event::Vote(vote)
    }
}

fn to_comment(op: &Operation, _ctx: &BlockContext) -> Event {
    let Operation::Comment(v) = op else {
        wrong_kind("comment", op)
    };
    if v.parent_author.is_empty() {
        Event::Post(PostEvent {
            permlink: v.permlink.clone(),
            parent_permlink: v.parent_permlink.clone(),
            author: v.author.clone(),
            title: v.title.clone(),
            body: v.body.clone(),
            json_metadata: v.json_metadata.clone(),
        })
    } else {
        Event::Comment(CommentEvent {
            permlink: v.permlink.clone(),
            parent_author: v.parent_author.clone(),
            parent_permlink: v.parent_permlink.clone(),
            author: v.author.clone(),
            title: v.title.clone(),
            body: v.body.clone(),
            json_metadata: v.json_metadata.clone(),
        })
    }
}

fn to_delete_comment(op: &Operation, _ctx: &BlockContext) -> Event {
    let Operation::DeleteComment(v) = op else {
        wrong_kind("delete_comment", op)
    };
    Event::DeleteComment(DeleteCommentEvent {
        author: v.author.clone(),
        permlink: v.permlink.clone(),
    })
}

fn to_create_game(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::CreateGame(v) => Event::CreateGame(v.clone()),
        other => wrong_kind("create_game", other),
    }
}

fn to_cancel_game(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::CancelGame(v) => Event::CancelGame(v.clone()),
        other => wrong_kind("cancel_game", other),
    }
}

fn to_update_game_start_time(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::UpdateGameStartTime(v) => Event::UpdateGameStartTime(v.clone()),
        other => wrong_kind("update_game_start_time", other),
    }
}

fn to_post_game_results(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::PostGameResults(v) => Event::PostGameResults(v.clone()),
        other => wrong_kind("post_game_results", other),
    }
}

fn to_post_bet(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::PostBet(v) => Event::PostBet(v.clone()),
        other => wrong_kind("post_bet", other),
    }
}

fn to_cancel_pending_bets(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::CancelPendingBets(v) => Event::CancelPendingBets(v.clone()),
        other => wrong_kind("cancel_pending_bets", other),
    }
}

fn to_bets_matched(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::BetsMatched(v) => Event::BetsMatched(v.clone()),
        other => wrong_kind("bets_matched", other),
    }
}

fn to_game_status_changed(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::GameStatusChanged(v) => Event::GameStatusChanged(v.clone()),
        other => wrong_kind("game_status_changed", other),
    }
}

fn to_bet_resolved(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::BetResolved(v) => Event::BetResolved(v.clone()),
        other => wrong_kind("bet_resolved", other),
    }
}

fn to_bet_cancelled(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::BetCancelled(v) => Event::BetCancelled(v.clone()),
        other => wrong_kind("bet_cancelled", other),
    }
}

fn to_transfer(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::Transfer(v) => Event::Transfer(v.clone()),
        other => wrong_kind("transfer", other),
    }
}

fn to_create_nft(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::CreateNft(v) => Event::CreateNft(v.clone()),
        other => wrong_kind("create_nft", other),
    }
}

fn to_update_nft_metadata(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::UpdateNftMetadata(v) => Event::UpdateNftMetadata(v.clone()),
        other => wrong_kind("update_nft_metadata", other),
    }
}

fn to_create_game_round(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::CreateGameRound(v) => Event::CreateGameRound(v.clone()),
        other => wrong_kind("create_game_round", other),
    }
}

fn to_update_game_round_result(op: &Operation, _ctx: &BlockContext) -> Event {
    match op {
        Operation::UpdateGameRoundResult(v) => Event::UpdateGameRoundResult(v.clone()),
        other => wrong_kind("update_game_round_result", other),
    }
}
