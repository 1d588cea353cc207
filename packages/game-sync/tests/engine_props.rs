// Property tests for snapshot application order.
//
//   PROPTEST_CASES=1000 cargo test -p game-sync --test engine_props

mod common;
mod support;

use game_sync::domain::GamePhase;
use game_sync::sync::{ApplyOutcome, SyncEngine};
use proptest::prelude::*;

use crate::support::{snapshot, table_roster};

fn phase_for(version: u64) -> GamePhase {
    match version % 3 {
        0 => GamePhase::Bidding,
        1 => GamePhase::Playing,
        _ => GamePhase::Scoring,
    }
}

/// Deliveries drawn from a small version space so duplicates and
/// out-of-order arrivals are common.
fn deliveries() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1u64..20, 1..40)
}

proptest! {
    #![proptest_config(common::proptest_config())]

    #[test]
    fn highest_version_wins_regardless_of_order(order in deliveries()) {
        let mut engine = SyncEngine::new("cy", table_roster());
        engine.begin_sync();
        let mut held: Option<u64> = None;

        for version in &order {
            let before = engine.displayed().cloned();
            let outcome = engine.apply_remote(snapshot(*version, phase_for(*version), 0));

            match held {
                Some(h) if *version <= h => {
                    prop_assert_eq!(outcome, ApplyOutcome::Stale { held: h });
                    prop_assert_eq!(engine.displayed().cloned(), before);
                }
                _ => {
                    prop_assert!(outcome.is_applied());
                    held = Some(*version);
                }
            }
        }

        let max = *order.iter().max().unwrap();
        let expected = snapshot(max, phase_for(max), 0);
        prop_assert_eq!(engine.authoritative(), Some(&expected));
        prop_assert_eq!(engine.displayed(), Some(&expected));
    }

    #[test]
    fn pending_actions_never_outlive_a_newer_snapshot(
        base in 1u64..10,
        bumps in prop::collection::vec(0u64..3, 1..10),
    ) {
        let mut engine = SyncEngine::new("cy", table_roster());
        engine.apply_remote(snapshot(base, GamePhase::Bidding, 2));
        engine
            .apply_local_optimistic(game_sync::GameAction::PassBid)
            .unwrap();

        let mut version = base;
        for bump in bumps {
            version += bump;
            engine.apply_remote(snapshot(version, GamePhase::Bidding, 3));
        }

        if version > base {
            prop_assert!(!engine.has_pending());
            prop_assert_eq!(engine.displayed(), engine.authoritative());
        } else {
            prop_assert_eq!(engine.pending_len(), 1);
            prop_assert_eq!(engine.displayed().unwrap().turn_owner_position, 3);
        }
    }
}
