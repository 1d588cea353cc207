use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::action::{ActionType, GameAction};

/// Opaque, unique action identifier.
///
/// The client mints one per submission and sends it as an idempotency key;
/// the authority may answer with its own id, in which case the ledger entry
/// is re-keyed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ActionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ActionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a ledger entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOrigin {
    /// Submitted by this client and still awaiting the authority.
    Local,
    /// Re-populated from the authority's outstanding action queue.
    Replayed,
}

/// An action submitted but not yet reflected in an authoritative snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub action_id: ActionId,
    pub action: GameAction,
    pub actor: String,
    pub submitted_at: OffsetDateTime,
    pub retry_count: u32,
    /// Snapshot version the action was based on; the authority's
    /// optimistic-concurrency token.
    pub expected_version: u64,
    pub origin: PendingOrigin,
}

impl PendingAction {
    pub fn action_type(&self) -> ActionType {
        self.action.action_type()
    }

    pub fn payload(&self) -> Value {
        self.action.payload()
    }

    /// Stale once an authoritative snapshot newer than its base version exists.
    pub fn is_superseded_by(&self, version: u64) -> bool {
        self.expected_version < version
    }
}
