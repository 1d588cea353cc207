//! Player actions and their advisory local effect.
//!
//! [`project`] is what optimistic display uses: it never decides legality,
//! it only predicts what the authority will most likely show next. When the
//! prediction cannot be made cleanly it returns a [`ProjectionConflict`] and
//! the caller falls back to the pure authoritative snapshot.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::domain::snapshot::{CardId, GamePhase, GameSnapshot, Suit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    PlayCard,
    DeclareTrump,
    PassBid,
    SkipTurn,
}

impl ActionType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActionType::PlayCard => "play_card",
            ActionType::DeclareTrump => "declare_trump",
            ActionType::PassBid => "pass_bid",
            ActionType::SkipTurn => "skip_turn",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameAction {
    PlayCard { card: CardId },
    DeclareTrump { suit: Suit },
    PassBid,
    /// Skip a silent turn owner sitting at `position`.
    SkipTurn { position: u8 },
}

#[derive(Deserialize)]
struct CardPayload {
    card: CardId,
}

#[derive(Deserialize)]
struct SuitPayload {
    suit: Suit,
}

#[derive(Deserialize)]
struct PositionPayload {
    position: u8,
}

impl GameAction {
    pub fn action_type(&self) -> ActionType {
        match self {
            GameAction::PlayCard { .. } => ActionType::PlayCard,
            GameAction::DeclareTrump { .. } => ActionType::DeclareTrump,
            GameAction::PassBid => ActionType::PassBid,
            GameAction::SkipTurn { .. } => ActionType::SkipTurn,
        }
    }

    /// JSON payload sent alongside the action type.
    pub fn payload(&self) -> Value {
        match self {
            GameAction::PlayCard { card } => json!({ "card": card }),
            GameAction::DeclareTrump { suit } => json!({ "suit": suit }),
            GameAction::PassBid => json!({}),
            GameAction::SkipTurn { position } => json!({ "position": position }),
        }
    }

    /// Rebuild an action from the type/payload pair the authority stores.
    pub fn from_parts(action_type: ActionType, payload: &Value) -> Result<Self, serde_json::Error> {
        let action = match action_type {
            ActionType::PlayCard => {
                let p: CardPayload = serde_json::from_value(payload.clone())?;
                GameAction::PlayCard { card: p.card }
            }
            ActionType::DeclareTrump => {
                let p: SuitPayload = serde_json::from_value(payload.clone())?;
                GameAction::DeclareTrump { suit: p.suit }
            }
            ActionType::PassBid => GameAction::PassBid,
            ActionType::SkipTurn => {
                let p: PositionPayload = serde_json::from_value(payload.clone())?;
                GameAction::SkipTurn {
                    position: p.position,
                }
            }
        };
        Ok(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionConflict {
    #[error("expected phase {expected:?}, snapshot is in {actual:?}")]
    PhaseMismatch {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("card {0} is not in the actor's hand")]
    CardNotInHand(CardId),
    #[error("actor already has a card on the table")]
    AlreadyPlayed,
    #[error("turn owner moved from position {expected} to {actual}")]
    TurnMoved { expected: u8, actual: u8 },
    #[error("seat count unknown")]
    NoSeats,
}

/// Apply `action` by `actor` to a copy of `snapshot`.
///
/// The projected snapshot keeps the authoritative version; it is a display
/// artifact only and is never fed back into version comparisons.
pub fn project(
    snapshot: &GameSnapshot,
    action: &GameAction,
    actor: &str,
    seats: usize,
) -> Result<GameSnapshot, ProjectionConflict> {
    let mut next = snapshot.clone();

    match action {
        GameAction::PlayCard { card } => {
            require_phase(snapshot, GamePhase::Playing)?;
            if next.table_cards.contains_key(actor) {
                return Err(ProjectionConflict::AlreadyPlayed);
            }
            let hand = next.hands.entry(actor.to_string()).or_default();
            let Some(idx) = hand.iter().position(|held| held == card) else {
                return Err(ProjectionConflict::CardNotInHand(card.clone()));
            };
            hand.remove(idx);
            next.table_cards.insert(actor.to_string(), card.clone());
        }
        GameAction::DeclareTrump { suit } => {
            require_phase(snapshot, GamePhase::Bidding)?;
            next.trump_suit = Some(*suit);
            next.trump_declarer = Some(actor.to_string());
            next.phase = GamePhase::Playing;
        }
        GameAction::PassBid => {
            require_phase(snapshot, GamePhase::Bidding)?;
            next.turn_owner_position = next_seat(snapshot.turn_owner_position, seats)?;
        }
        GameAction::SkipTurn { position } => {
            if snapshot.turn_owner_position != *position {
                return Err(ProjectionConflict::TurnMoved {
                    expected: *position,
                    actual: snapshot.turn_owner_position,
                });
            }
            next.turn_owner_position = next_seat(*position, seats)?;
        }
    }

    Ok(next)
}

fn require_phase(snapshot: &GameSnapshot, expected: GamePhase) -> Result<(), ProjectionConflict> {
    if snapshot.phase != expected {
        return Err(ProjectionConflict::PhaseMismatch {
            expected,
            actual: snapshot.phase,
        });
    }
    Ok(())
}

fn next_seat(position: u8, seats: usize) -> Result<u8, ProjectionConflict> {
    if seats == 0 {
        return Err(ProjectionConflict::NoSeats);
    }
    let next = (position as usize + 1) % seats;
    u8::try_from(next).map_err(|_| ProjectionConflict::NoSeats)
}
