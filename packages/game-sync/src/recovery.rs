//! Refetching authoritative state after the local view may have diverged.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::authority::{Authority, QueuedAction};
use crate::backoff;
use crate::config::RecoveryConfig;
use crate::domain::GameSnapshot;
use crate::error::{AuthorityError, AuthorityErrorKind};
use crate::sync::{ApplyOutcome, SyncEngine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryTrigger {
    /// Realtime channel dropped while a snapshot was held.
    Disconnected,
    /// An action submission failed at the network level.
    NetworkFailure,
    /// The authority rejected an action as based on a stale version.
    Conflict,
    /// The initial snapshot could not be loaded.
    InitialLoad,
}

impl fmt::Display for RecoveryTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecoveryTrigger::Disconnected => "disconnected",
            RecoveryTrigger::NetworkFailure => "network_failure",
            RecoveryTrigger::Conflict => "conflict",
            RecoveryTrigger::InitialLoad => "initial_load",
        };
        f.write_str(name)
    }
}

/// What a direct fetch brought back.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub snapshot: GameSnapshot,
    pub queue: Option<Vec<QueuedAction>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStep {
    Retry { attempt: u32, delay: Duration },
    /// Attempts exhausted; the engine is now degraded.
    Exhausted { attempts: u32 },
}

#[derive(Clone)]
pub struct RecoveryManager {
    authority: Arc<dyn Authority>,
    config: RecoveryConfig,
}

impl RecoveryManager {
    pub fn new(authority: Arc<dyn Authority>, config: RecoveryConfig) -> Self {
        Self { authority, config }
    }

    /// Put `engine` into recovery. Returns `false` when a recovery is already
    /// running or the session is degraded, in which case no fetch is needed.
    pub fn start(&self, engine: &mut SyncEngine, trigger: RecoveryTrigger) -> bool {
        let started = engine.begin_recovery();
        if started {
            info!(
                trigger = %trigger,
                version = engine.version(),
                pending = engine.pending_len(),
                "Starting recovery"
            );
        }
        started
    }

    /// Fetch the snapshot, then the outstanding action queue if there is one.
    pub async fn fetch(&self, game_code: &str) -> Result<Recovered, AuthorityError> {
        let snapshot = self.authority.fetch_snapshot(game_code).await?;
        let queue = match self.authority.fetch_action_queue(game_code).await {
            Ok(queue) => queue,
            Err(err) if err.kind == AuthorityErrorKind::Network => return Err(err),
            Err(err) => {
                warn!(game_code, error = %err, "Action queue unavailable, keeping local ledger");
                None
            }
        };
        Ok(Recovered { snapshot, queue })
    }

    pub fn complete(&self, engine: &mut SyncEngine, recovered: Recovered) -> ApplyOutcome {
        let outcome = engine.complete_recovery(recovered.snapshot, recovered.queue);
        info!(version = engine.version(), pending = engine.pending_len(), "Recovery complete");
        outcome
    }

    /// Count a failed fetch and decide whether to try again.
    ///
    /// The delay before the next attempt is `min(base * 2^attempts, cap)`
    /// where `attempts` counts earlier failures.
    pub fn on_failure(&self, engine: &mut SyncEngine, err: &AuthorityError) -> RecoveryStep {
        let delay = backoff::exponential(
            self.config.base_delay,
            engine.recovery_attempts(),
            self.config.max_delay,
        );
        let attempts = engine.record_recovery_failure();

        if attempts >= self.config.max_attempts {
            error!(attempts, error = %err, "Recovery attempts exhausted");
            engine.mark_degraded();
            return RecoveryStep::Exhausted { attempts };
        }

        warn!(
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Recovery fetch failed, retrying"
        );
        RecoveryStep::Retry {
            attempt: attempts,
            delay,
        }
    }
}
