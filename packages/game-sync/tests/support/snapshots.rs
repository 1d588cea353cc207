use std::collections::BTreeMap;
use std::time::Duration;

use game_sync::domain::{GamePhase, GameSnapshot, Roster};
use game_sync::SyncConfig;
use time::macros::datetime;

pub fn table_roster() -> Roster {
    Roster::new(["ana", "ben", "cy", "dee"])
}

pub fn snapshot(version: u64, phase: GamePhase, turn_owner: u8) -> GameSnapshot {
    GameSnapshot {
        id: "g-1".into(),
        version,
        phase,
        status: Default::default(),
        turn_owner_position: turn_owner,
        trick_number: 0,
        scores: BTreeMap::from([
            ("ana".to_string(), 0),
            ("ben".to_string(), 0),
            ("cy".to_string(), 0),
            ("dee".to_string(), 0),
        ]),
        hands: BTreeMap::from([(
            "cy".to_string(),
            vec!["AH".to_string(), "7S".to_string(), "KD".to_string()],
        )]),
        table_cards: BTreeMap::new(),
        trump_suit: None,
        trump_declarer: None,
        last_error: None,
        updated_at: datetime!(2024-03-01 12:00 UTC),
    }
}

/// Defaults with the heartbeat watchdog and turn skipping kept out of the way.
pub fn quiet_config() -> SyncConfig {
    let mut config = SyncConfig::default();
    config.transport.heartbeat_timeout = Duration::from_secs(3600);
    config.turn_timeout.enabled = false;
    config
}
