//! The seam to the remote authority that owns game state.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::domain::{ActionId, ActionType, GameAction, GameSnapshot, PendingAction, PendingOrigin};
use crate::error::AuthorityError;

pub use http::HttpAuthority;

/// Body of an action submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(skip)]
    pub game_code: String,
    /// Idempotency key minted by the client.
    pub client_action_id: ActionId,
    pub player_name: String,
    pub action_type: ActionType,
    pub payload: Value,
    pub expected_version: u64,
}

impl ActionRequest {
    pub fn from_pending(game_code: &str, pending: &PendingAction) -> Self {
        Self {
            game_code: game_code.to_string(),
            client_action_id: pending.action_id.clone(),
            player_name: pending.actor.clone(),
            action_type: pending.action_type(),
            payload: pending.payload(),
            expected_version: pending.expected_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    pub action_id: ActionId,
}

/// An action the authority has accepted but not yet folded into a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    pub action_id: ActionId,
    pub player_name: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub payload: Value,
    pub expected_version: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}

impl QueuedAction {
    /// Ledger entry for this queued action, or `None` when its payload does
    /// not describe a valid action.
    pub fn to_pending(&self) -> Option<PendingAction> {
        let action = GameAction::from_parts(self.action_type, &self.payload).ok()?;
        Some(PendingAction {
            action_id: self.action_id.clone(),
            action,
            actor: self.player_name.clone(),
            submitted_at: self.submitted_at,
            retry_count: 0,
            expected_version: self.expected_version,
            origin: PendingOrigin::Replayed,
        })
    }
}

#[async_trait]
pub trait Authority: Send + Sync {
    /// Direct read of the current snapshot, bypassing the realtime channel.
    async fn fetch_snapshot(&self, game_code: &str) -> Result<GameSnapshot, AuthorityError>;

    async fn submit_action(&self, request: &ActionRequest) -> Result<ActionReceipt, AuthorityError>;

    /// Outstanding actions for the game; `None` when the authority exposes no queue.
    async fn fetch_action_queue(
        &self,
        game_code: &str,
    ) -> Result<Option<Vec<QueuedAction>>, AuthorityError>;
}
