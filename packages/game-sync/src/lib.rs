#![deny(clippy::wildcard_imports)]
#![cfg_attr(test, allow(clippy::wildcard_imports))]

//! Client-side synchronization core for a trick-taking card game whose
//! authoritative state lives on a remote server.

pub mod authority;
pub mod backoff;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod errors;
pub mod presence;
pub mod recovery;
pub mod session;
pub mod sync;
pub mod transport;
pub mod turn_timeout;

// Re-exports for public API
pub use authority::{ActionReceipt, ActionRequest, Authority, HttpAuthority, QueuedAction};
pub use config::{
    DispatchConfig, PresenceConfig, RecoveryConfig, SyncConfig, TransportConfig,
    TurnTimeoutConfig,
};
pub use dispatch::{ActionDispatcher, Dispatched};
pub use domain::{
    ActionId, ActionType, GameAction, GamePhase, GameSnapshot, GameStatus, PendingAction, Roster,
    Suit,
};
pub use error::{AuthorityError, AuthorityErrorKind, ConfigError, SyncError, TransportError};
pub use errors::ErrorCode;
pub use presence::{PresenceStatus, PresenceTracker};
pub use recovery::{RecoveryManager, RecoveryTrigger};
pub use session::{Connectivity, GameSession, Notice, SessionHandle, SessionParams, SessionView};
pub use sync::{ApplyOutcome, SyncEngine, SyncPhase};
pub use transport::{
    ChannelEvent, ConnectionStatus, RealtimeTransport, TransportChannel, WsTransport,
};
pub use turn_timeout::TurnTimeoutMonitor;

// Auto-initialize logging for unit tests
#[cfg(test)]
#[ctor::ctor]
fn init_test_logging() {
    sync_test_support::logging::init();
}
