//! Authoritative game snapshot as delivered by the authority.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque card identifier such as `"AH"` or `"10S"`.
pub type CardId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "H")]
    Hearts,
    #[serde(rename = "D")]
    Diamonds,
    #[serde(rename = "C")]
    Clubs,
    #[serde(rename = "S")]
    Spades,
}

impl Suit {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Suit::Hearts => "H",
            Suit::Diamonds => "D",
            Suit::Clubs => "C",
            Suit::Spades => "S",
        }
    }
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Suit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h" | "hearts" => Ok(Suit::Hearts),
            "d" | "diamonds" => Ok(Suit::Diamonds),
            "c" | "clubs" => Ok(Suit::Clubs),
            "s" | "spades" => Ok(Suit::Spades),
            other => Err(format!("unknown suit '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Bidding,
    Playing,
    Scoring,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Active,
    Interrupted,
    Finished,
}

/// Complete game state at one authoritative version.
///
/// `version` is the only ordering the sync core trusts: a held snapshot is
/// never replaced by one with an equal or lower version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub id: String,
    pub version: u64,
    pub phase: GamePhase,
    #[serde(default)]
    pub status: GameStatus,
    /// Index into the externally owned [`Roster`](crate::domain::Roster).
    pub turn_owner_position: u8,
    #[serde(default)]
    pub trick_number: u8,
    #[serde(default)]
    pub scores: BTreeMap<String, i32>,
    /// Private per player; the authority only fills in the viewer's own hand.
    #[serde(default)]
    pub hands: BTreeMap<String, Vec<CardId>>,
    /// Cards on the table for the current trick.
    #[serde(default)]
    pub table_cards: BTreeMap<String, CardId>,
    pub trump_suit: Option<Suit>,
    pub trump_declarer: Option<String>,
    /// Last processing error the authority recorded for this game.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl GameSnapshot {
    /// Number of seats implied by the snapshot when no roster is known.
    pub fn seat_count(&self) -> usize {
        self.scores.len().max(self.hands.len())
    }

    pub fn hand_of(&self, player: &str) -> &[CardId] {
        self.hands.get(player).map(Vec::as_slice).unwrap_or(&[])
    }
}
