//! The single owner of a session's game state.
//!
//! [`SyncEngine`] holds the authoritative snapshot, the ledger of actions in
//! flight and the displayed state derived from both. Displayed state is always
//! either the authoritative snapshot with every pending action replayed on top
//! of it in submission order, or the bare authoritative snapshot when any of
//! those projections conflicts. Nothing in between is ever shown.

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::authority::{ActionReceipt, QueuedAction};
use crate::domain::{
    project, ActionId, GameAction, GameSnapshot, PendingAction, PendingOrigin, Roster,
};
use crate::error::SyncError;
use crate::sync::state::{SyncEvent, SyncPhase};

/// Result of offering a snapshot to [`SyncEngine::apply_remote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Version not newer than the held one; nothing changed.
    Stale { held: u64 },
    /// The session is degraded and no longer accepts snapshots.
    Ignored,
    Applied {
        version: u64,
        /// Pending actions dropped because the new snapshot supersedes them.
        superseded: Vec<ActionId>,
    },
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied { .. })
    }
}

pub struct SyncEngine {
    player_name: String,
    roster: Roster,
    phase: SyncPhase,
    authoritative: Option<GameSnapshot>,
    /// In submission order.
    pending: Vec<PendingAction>,
    displayed: Option<GameSnapshot>,
    in_doubt: bool,
    last_synced_at: Option<OffsetDateTime>,
    recovery_attempts: u32,
}

impl SyncEngine {
    pub fn new(player_name: impl Into<String>, roster: Roster) -> Self {
        Self {
            player_name: player_name.into(),
            roster,
            phase: SyncPhase::Idle,
            authoritative: None,
            pending: Vec::new(),
            displayed: None,
            in_doubt: false,
            last_synced_at: None,
            recovery_attempts: 0,
        }
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn phase(&self) -> SyncPhase {
        self.phase
    }

    pub fn authoritative(&self) -> Option<&GameSnapshot> {
        self.authoritative.as_ref()
    }

    /// What consumers should render.
    pub fn displayed(&self) -> Option<&GameSnapshot> {
        self.displayed.as_ref()
    }

    /// Whether the last projection conflicted and display fell back to the
    /// bare authoritative snapshot.
    pub fn is_in_doubt(&self) -> bool {
        self.in_doubt
    }

    pub fn version(&self) -> Option<u64> {
        self.authoritative.as_ref().map(|s| s.version)
    }

    pub fn pending(&self) -> &[PendingAction] {
        &self.pending
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn last_synced_at(&self) -> Option<OffsetDateTime> {
        self.last_synced_at
    }

    pub fn recovery_attempts(&self) -> u32 {
        self.recovery_attempts
    }

    fn fire(&mut self, event: SyncEvent) {
        let next = self.phase.transition(event);
        if next != self.phase {
            debug!(from = ?self.phase, to = ?next, event = ?event, "Sync phase changed");
            self.phase = next;
        }
    }

    pub fn begin_sync(&mut self) {
        self.fire(SyncEvent::BeginSync);
    }

    /// Replace the held snapshot if `snapshot` is strictly newer.
    pub fn apply_remote(&mut self, snapshot: GameSnapshot) -> ApplyOutcome {
        if self.phase.is_terminal() {
            return ApplyOutcome::Ignored;
        }
        if let Some(held) = self.version() {
            if snapshot.version <= held {
                debug!(held, offered = snapshot.version, "Ignoring stale snapshot");
                return ApplyOutcome::Stale { held };
            }
        }

        let version = snapshot.version;
        let mut superseded = Vec::new();
        self.pending.retain(|p| {
            if p.is_superseded_by(version) {
                superseded.push(p.action_id.clone());
                false
            } else {
                true
            }
        });

        debug!(
            version,
            superseded = superseded.len(),
            pending = self.pending.len(),
            "Applied authoritative snapshot"
        );

        self.authoritative = Some(snapshot);
        self.last_synced_at = Some(OffsetDateTime::now_utc());
        self.recovery_attempts = 0;
        self.fire(SyncEvent::SnapshotApplied);
        self.refresh_display();

        ApplyOutcome::Applied {
            version,
            superseded,
        }
    }

    /// Register `action` by the local player and show its projected effect.
    ///
    /// The entry is keyed by a client-minted id until the authority answers.
    pub fn apply_local_optimistic(&mut self, action: GameAction) -> Result<PendingAction, SyncError> {
        if self.phase.is_terminal() {
            return Err(SyncError::recovery_exhausted(self.recovery_attempts));
        }
        let Some(expected_version) = self.version() else {
            return Err(SyncError::NotReady);
        };

        let entry = PendingAction {
            action_id: ActionId::new_v4(),
            action,
            actor: self.player_name.clone(),
            submitted_at: OffsetDateTime::now_utc(),
            retry_count: 0,
            expected_version,
            origin: PendingOrigin::Local,
        };
        self.pending.push(entry.clone());
        self.refresh_display();
        Ok(entry)
    }

    /// Re-key a local entry with the id the authority assigned.
    pub fn confirm_dispatch(&mut self, client_id: &ActionId, receipt: &ActionReceipt, retries: u32) {
        let Some(entry) = self.pending.iter_mut().find(|p| &p.action_id == client_id) else {
            // superseded while in flight
            return;
        };
        entry.retry_count = retries;
        if &receipt.action_id != client_id {
            debug!(client_id = %client_id, action_id = %receipt.action_id, "Re-keyed pending action");
            entry.action_id = receipt.action_id.clone();
        }
    }

    /// Drop a pending action the authority refused; display rolls back.
    pub fn reject(&mut self, action_id: &ActionId) -> Option<PendingAction> {
        let removed = self.remove(action_id);
        if removed.is_some() {
            info!(action_id = %action_id, "Rolled back rejected action");
            self.refresh_display();
        }
        removed
    }

    /// Drop a pending action the authority reports as processed.
    pub fn acknowledge(&mut self, action_id: &ActionId) -> Option<PendingAction> {
        let removed = self.remove(action_id);
        if removed.is_some() {
            self.refresh_display();
        }
        removed
    }

    fn remove(&mut self, action_id: &ActionId) -> Option<PendingAction> {
        let idx = self.pending.iter().position(|p| &p.action_id == action_id)?;
        Some(self.pending.remove(idx))
    }

    /// Enter recovery. Returns `false` when already recovering or degraded.
    pub fn begin_recovery(&mut self) -> bool {
        let before = self.phase;
        self.fire(SyncEvent::RecoveryStarted);
        before != SyncPhase::Recovering && self.phase == SyncPhase::Recovering
    }

    /// Count a failed recovery fetch and return the new attempt total.
    pub fn record_recovery_failure(&mut self) -> u32 {
        self.recovery_attempts += 1;
        self.recovery_attempts
    }

    /// Finish recovery with a directly fetched snapshot and, when the
    /// authority exposes one, its queue of unprocessed actions.
    ///
    /// Queued actions of the local player replace every guess the ledger
    /// held; without a queue, surviving local entries are kept.
    pub fn complete_recovery(
        &mut self,
        snapshot: GameSnapshot,
        queue: Option<Vec<QueuedAction>>,
    ) -> ApplyOutcome {
        if self.phase.is_terminal() {
            return ApplyOutcome::Ignored;
        }

        let outcome = self.apply_remote(snapshot);

        if let Some(queue) = queue {
            let replayed: Vec<PendingAction> = queue
                .iter()
                .filter(|q| q.player_name == self.player_name)
                .filter_map(|q| {
                    let entry = q.to_pending();
                    if entry.is_none() {
                        warn!(action_id = %q.action_id, "Skipping unreadable queued action");
                    }
                    entry
                })
                .collect();
            info!(
                replayed = replayed.len(),
                discarded = self.pending.len(),
                "Re-populated pending actions from authority queue"
            );
            self.pending = replayed;
        }

        self.recovery_attempts = 0;
        self.last_synced_at = Some(OffsetDateTime::now_utc());
        self.fire(SyncEvent::RecoveryCompleted);
        self.refresh_display();
        outcome
    }

    pub fn mark_degraded(&mut self) {
        self.fire(SyncEvent::RecoveryExhausted);
        warn!(attempts = self.recovery_attempts, "Session degraded");
    }

    fn seats(&self) -> usize {
        if self.roster.is_empty() {
            self.authoritative
                .as_ref()
                .map(GameSnapshot::seat_count)
                .unwrap_or(0)
        } else {
            self.roster.len()
        }
    }

    fn refresh_display(&mut self) {
        let Some(base) = self.authoritative.as_ref() else {
            self.displayed = None;
            self.in_doubt = false;
            return;
        };

        let seats = self.seats();
        let mut view = base.clone();
        for entry in &self.pending {
            match project(&view, &entry.action, &entry.actor, seats) {
                Ok(next) => view = next,
                Err(conflict) => {
                    debug!(
                        action_id = %entry.action_id,
                        conflict = %conflict,
                        "Projection conflict, showing authoritative state"
                    );
                    self.displayed = Some(base.clone());
                    self.in_doubt = true;
                    return;
                }
            }
        }
        self.displayed = Some(view);
        self.in_doubt = false;
    }
}
