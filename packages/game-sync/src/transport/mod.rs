//! Realtime transport: the seam to the push channel and the channel state
//! machine built on top of it.

pub mod channel;
pub mod connection;
pub mod protocol;
pub mod ws;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;

use crate::domain::{ActionId, GameSnapshot};
use crate::error::TransportError;

pub use channel::{ChannelEvent, TransportChannel};
pub use connection::{ConnectionState, ConnectionStatus};
pub use protocol::{PresenceKind, Topic};
pub use ws::WsTransport;

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceEvent {
    pub kind: PresenceKind,
    pub player_name: String,
    pub timestamp: OffsetDateTime,
}

/// What the local client tells peers about itself.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceAnnouncement {
    pub player_name: String,
    pub online_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Heartbeat,
    RemoteUpdate(GameSnapshot),
    Presence(PresenceEvent),
    ActionResult {
        action_id: ActionId,
        error: Option<String>,
    },
    /// The underlying connection is gone; the transport is unsubscribed.
    Closed { reason: String },
}

/// One realtime connection scoped to a game's topics.
///
/// Implementations carry no game semantics. `next_event` is only polled while
/// subscribed and must be cancel-safe: the channel drops it whenever a timer
/// fires first.
#[async_trait]
pub trait RealtimeTransport: Send {
    /// (Re)connect and subscribe to the game and presence topics of `game_code`.
    async fn subscribe(&mut self, game_code: &str) -> Result<(), TransportError>;

    async fn track(&mut self, announcement: &PresenceAnnouncement) -> Result<(), TransportError>;

    async fn send(&mut self, event: &str, payload: Value) -> Result<(), TransportError>;

    async fn next_event(&mut self) -> TransportEvent;

    async fn unsubscribe(&mut self);
}
