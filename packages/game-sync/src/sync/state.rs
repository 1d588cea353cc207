use serde::Serialize;

/// Lifecycle of a session's local copy of the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Idle,
    /// Initial snapshot requested.
    Syncing,
    Synced,
    /// Refetching after a disconnect, network failure or conflict.
    Recovering,
    /// Recovery exhausted; terminal until the session is rebuilt.
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    BeginSync,
    /// A newer authoritative snapshot was applied.
    SnapshotApplied,
    RecoveryStarted,
    RecoveryCompleted,
    RecoveryExhausted,
}

impl SyncPhase {
    pub fn transition(self, event: SyncEvent) -> SyncPhase {
        use SyncEvent::*;
        use SyncPhase::*;

        match (self, event) {
            (Degraded, _) => Degraded,
            (Idle, BeginSync) => Syncing,
            (Idle | Syncing | Synced, SnapshotApplied) => Synced,
            // a pushed snapshot does not end recovery; the direct fetch does
            (Recovering, SnapshotApplied) => Recovering,
            (Syncing | Synced, RecoveryStarted) => Recovering,
            (Recovering, RecoveryCompleted) => Synced,
            (Syncing | Recovering, RecoveryExhausted) => Degraded,
            (phase, _) => phase,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == SyncPhase::Degraded
    }
}

#[cfg(test)]
mod tests {
    use super::SyncEvent::*;
    use super::SyncPhase::*;
    use super::*;

    #[test]
    fn transition_table() {
        let cases = [
            (Idle, BeginSync, Syncing),
            (Idle, SnapshotApplied, Synced),
            (Syncing, SnapshotApplied, Synced),
            (Synced, SnapshotApplied, Synced),
            (Synced, RecoveryStarted, Recovering),
            (Syncing, RecoveryStarted, Recovering),
            (Recovering, SnapshotApplied, Recovering),
            (Recovering, RecoveryStarted, Recovering),
            (Recovering, RecoveryCompleted, Synced),
            (Recovering, RecoveryExhausted, Degraded),
            (Synced, RecoveryCompleted, Synced),
            (Synced, BeginSync, Synced),
        ];
        for (from, event, to) in cases {
            assert_eq!(from.transition(event), to, "{from:?} + {event:?}");
        }
    }

    #[test]
    fn degraded_is_terminal() {
        for event in [
            BeginSync,
            SnapshotApplied,
            RecoveryStarted,
            RecoveryCompleted,
            RecoveryExhausted,
        ] {
            assert_eq!(Degraded.transition(event), Degraded);
        }
        assert!(Degraded.is_terminal());
        assert!(!Recovering.is_terminal());
    }
}
