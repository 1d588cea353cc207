//! Skips the turn of a player who has gone silent.

use tokio::time::Instant;
use tracing::info;

use crate::config::TurnTimeoutConfig;
use crate::domain::{GameAction, GamePhase, GameSnapshot, GameStatus, Roster};
use crate::presence::PresenceTracker;

/// Identifies one turn: a change of owner or phase starts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TurnKey {
    owner: u8,
    phase: GamePhase,
}

impl TurnKey {
    fn of(snapshot: &GameSnapshot) -> Self {
        Self {
            owner: snapshot.turn_owner_position,
            phase: snapshot.phase,
        }
    }
}

pub struct TurnTimeoutMonitor {
    config: TurnTimeoutConfig,
    local_player: String,
    current: Option<TurnKey>,
    fired: bool,
}

impl TurnTimeoutMonitor {
    pub fn new(config: TurnTimeoutConfig, local_player: impl Into<String>) -> Self {
        Self {
            config,
            local_player: local_player.into(),
            current: None,
            fired: false,
        }
    }

    pub fn config(&self) -> &TurnTimeoutConfig {
        &self.config
    }

    /// The skip to submit now, if the turn owner has been away too long.
    ///
    /// Fires at most once per turn; a snapshot with a new owner or phase
    /// re-arms it.
    pub fn check(
        &mut self,
        snapshot: &GameSnapshot,
        roster: &Roster,
        presence: &PresenceTracker,
        now: Instant,
    ) -> Option<GameAction> {
        if !self.config.enabled {
            return None;
        }

        let key = TurnKey::of(snapshot);
        if self.current != Some(key) {
            self.current = Some(key);
            self.fired = false;
        }
        if self.fired
            || snapshot.status != GameStatus::Active
            || snapshot.phase == GamePhase::Scoring
        {
            return None;
        }

        let owner = roster.name_at(key.owner)?;
        if owner == self.local_player {
            return None;
        }

        let away_since = presence.away_since(owner, now)?;
        let away_for = now.saturating_duration_since(away_since);
        if away_for <= self.config.timeout {
            return None;
        }

        self.fired = true;
        info!(
            owner,
            position = key.owner,
            away_ms = away_for.as_millis() as u64,
            "Turn owner away, submitting skip"
        );
        Some(GameAction::SkipTurn {
            position: key.owner,
        })
    }
}
