//! Liveness of the players at the table, derived from presence events.
//!
//! Purely observational: nothing here feeds into game state except the turn
//! timeout heuristic.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::Instant;

use crate::config::PresenceConfig;
use crate::transport::{PresenceEvent, PresenceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenceStatus {
    Online,
    Idle,
    Away,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceRecord {
    pub player_name: String,
    /// Local receive time; peer clocks are not trusted for liveness.
    pub last_seen_at: Instant,
    /// Timestamp the peer reported.
    pub reported_at: OffsetDateTime,
    pub left: bool,
}

pub struct PresenceTracker {
    config: PresenceConfig,
    started_at: Instant,
    records: HashMap<String, PresenceRecord>,
}

impl PresenceTracker {
    pub fn new(config: PresenceConfig, now: Instant) -> Self {
        Self {
            config,
            started_at: now,
            records: HashMap::new(),
        }
    }

    pub fn observe(&mut self, event: &PresenceEvent, now: Instant) {
        let left = event.kind == PresenceKind::Leave;
        self.records.insert(
            event.player_name.clone(),
            PresenceRecord {
                player_name: event.player_name.clone(),
                last_seen_at: now,
                reported_at: event.timestamp,
                left,
            },
        );
    }

    pub fn record(&self, player: &str) -> Option<&PresenceRecord> {
        self.records.get(player)
    }

    pub fn status(&self, player: &str, now: Instant) -> PresenceStatus {
        let Some(record) = self.records.get(player) else {
            return PresenceStatus::Away;
        };
        if record.left {
            return PresenceStatus::Away;
        }
        let silent = now.saturating_duration_since(record.last_seen_at);
        if silent <= self.config.online_within {
            PresenceStatus::Online
        } else if silent <= self.config.idle_within {
            PresenceStatus::Idle
        } else {
            PresenceStatus::Away
        }
    }

    /// When `player` became away, or `None` if they are not away at `now`.
    ///
    /// A player never seen counts as away since the tracker started.
    pub fn away_since(&self, player: &str, now: Instant) -> Option<Instant> {
        if self.status(player, now) != PresenceStatus::Away {
            return None;
        }
        let since = match self.records.get(player) {
            None => self.started_at,
            Some(record) if record.left => record.last_seen_at,
            Some(record) => record.last_seen_at + self.config.idle_within,
        };
        Some(since)
    }

    /// Status of every player heard from, by name.
    pub fn statuses(&self, now: Instant) -> BTreeMap<String, PresenceStatus> {
        self.records
            .keys()
            .map(|name| (name.clone(), self.status(name, now)))
            .collect()
    }
}
