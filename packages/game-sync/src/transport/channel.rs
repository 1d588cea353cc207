//! Connection lifecycle for one game's realtime topics.
//!
//! [`TransportChannel`] wraps a [`RealtimeTransport`] with reconnect backoff,
//! a heartbeat watchdog and presence announcements. It surfaces only what the
//! layers above care about as [`ChannelEvent`]s.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;
use time::OffsetDateTime;
use tokio::time::{interval_at, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backoff;
use crate::config::TransportConfig;
use crate::domain::{ActionId, GameSnapshot};
use crate::error::{SyncError, TransportError};
use crate::transport::connection::{ConnectionState, ConnectionStatus, ReconnectDecision};
use crate::transport::{PresenceAnnouncement, PresenceEvent, RealtimeTransport, TransportEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// Subscribed (first time or after a reconnect).
    Connected,
    /// Connection lost; another attempt is scheduled.
    Disconnected {
        reason: String,
        attempt: u32,
        retry_in: Duration,
    },
    RemoteUpdate(GameSnapshot),
    Presence(PresenceEvent),
    ActionResult {
        action_id: ActionId,
        error: Option<String>,
    },
    /// Reconnect attempts exhausted; the channel stays down.
    Failed(SyncError),
}

/// Transport work that runs to completion even if the caller stops polling.
/// The transport travels with the future and comes back with its outcome.
type InFlight<T> = Pin<Box<dyn Future<Output = (T, Completion)> + Send>>;

enum Completion {
    Subscribed {
        game_code: String,
        result: Result<(), TransportError>,
    },
    /// Unsubscribed because the socket went silent.
    Dropped { reason: String },
    Tracked(Result<(), TransportError>),
}

pub struct TransportChannel<T> {
    /// `None` while `in_flight` owns it.
    transport: Option<T>,
    in_flight: Option<InFlight<T>>,
    completed: Option<Completion>,
    config: TransportConfig,
    player_name: String,
    game_code: Option<String>,
    state: ConnectionState,
    reconnect_at: Option<Instant>,
    watchdog: Interval,
    presence_refresh: Interval,
}

impl<T: RealtimeTransport + 'static> TransportChannel<T> {
    /// Must be called from within a tokio runtime, with a validated config.
    pub fn new(transport: T, config: TransportConfig, player_name: impl Into<String>) -> Self {
        let now = Instant::now();
        let mut watchdog = interval_at(now + config.heartbeat_interval, config.heartbeat_interval);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut presence_refresh =
            interval_at(now + config.presence_refresh, config.presence_refresh);
        presence_refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            transport: Some(transport),
            in_flight: None,
            completed: None,
            config,
            player_name: player_name.into(),
            game_code: None,
            state: ConnectionState::new(now),
            reconnect_at: None,
            watchdog,
            presence_refresh,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Start connecting to `game_code`; the subscribe happens inside the next
    /// [`next_event`](Self::next_event) call.
    pub fn connect(&mut self, game_code: impl Into<String>) {
        let game_code = game_code.into();
        info!(game_code = %game_code, "Connecting realtime channel");
        self.game_code = Some(game_code);
        self.state.status = ConnectionStatus::Connecting;
        self.reconnect_at = Some(Instant::now());
    }

    /// Resubscribe now with a fresh attempt budget.
    pub fn reconnect(&mut self) {
        if self.game_code.is_none() {
            return;
        }
        self.state.reset_attempts();
        self.reconnect_at = Some(Instant::now());
    }

    pub async fn send(&mut self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.settle().await;
        match self.transport.as_mut() {
            Some(transport) if self.state.is_connected() => transport.send(event, payload).await,
            _ => Err(TransportError::Closed),
        }
    }

    /// Unsubscribe and disarm every timer. Idempotent.
    pub async fn disconnect(&mut self) {
        self.game_code = None;
        self.reconnect_at = None;
        self.settle().await;
        self.completed = None;
        if self.state.status != ConnectionStatus::Disconnected {
            if let Some(transport) = self.transport.as_mut() {
                transport.unsubscribe().await;
            }
        }
        self.state.status = ConnectionStatus::Disconnected;
        debug!("Realtime channel disconnected");
    }

    /// Wait for the next event worth reporting upward.
    ///
    /// Cancel-safe. Subscribe, unsubscribe and presence calls are owned by the
    /// channel rather than by this future, so dropping it neither restarts nor
    /// loses them; their outcome is reported by the next call.
    pub async fn next_event(&mut self) -> ChannelEvent {
        loop {
            self.settle().await;
            if let Some(done) = self.completed.take() {
                if let Some(out) = self.on_completed(done) {
                    return out;
                }
                continue;
            }

            let connected = self.state.is_connected();
            let reconnect_at = self.reconnect_at;

            tokio::select! {
                Some(event) = next_transport_event(self.transport.as_mut()), if connected => {
                    if let Some(out) = self.on_transport_event(event) {
                        return out;
                    }
                }
                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    if let Some(out) = self.start_subscribe() {
                        return out;
                    }
                }
                _ = self.watchdog.tick() => self.check_heartbeat(),
                _ = self.presence_refresh.tick(), if connected => self.start_track(),
            }
        }
    }

    /// Drive the in-flight operation, if any, and park its outcome.
    async fn settle(&mut self) {
        if let Some(op) = self.in_flight.as_mut() {
            let (transport, done) = op.await;
            self.in_flight = None;
            self.transport = Some(transport);
            self.completed = Some(done);
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) -> Option<ChannelEvent> {
        let now = Instant::now();
        match event {
            TransportEvent::Heartbeat => {
                self.state.on_signal(now);
                None
            }
            TransportEvent::RemoteUpdate(snapshot) => {
                self.state.on_signal(now);
                Some(ChannelEvent::RemoteUpdate(snapshot))
            }
            TransportEvent::Presence(presence) => {
                self.state.on_signal(now);
                Some(ChannelEvent::Presence(presence))
            }
            TransportEvent::ActionResult { action_id, error } => {
                self.state.on_signal(now);
                Some(ChannelEvent::ActionResult { action_id, error })
            }
            TransportEvent::Closed { reason } => Some(self.on_disconnect(reason)),
        }
    }

    fn on_completed(&mut self, done: Completion) -> Option<ChannelEvent> {
        match done {
            Completion::Subscribed { game_code, result } => match result {
                Ok(()) => {
                    self.state.on_subscribed(Instant::now());
                    self.reconnect_at = None;
                    self.watchdog.reset();
                    self.presence_refresh.reset();
                    info!(game_code = %game_code, "Realtime channel subscribed");
                    Some(ChannelEvent::Connected)
                }
                Err(err) => {
                    warn!(game_code = %game_code, error = %err, "Realtime subscribe failed");
                    Some(self.on_disconnect(err.to_string()))
                }
            },
            Completion::Dropped { reason } => Some(self.on_disconnect(reason)),
            Completion::Tracked(result) => {
                if let Err(err) = result {
                    warn!(error = %err, "Failed to announce presence");
                }
                None
            }
        }
    }

    /// Subscribe then announce presence, each bounded by `subscribe_timeout`.
    fn start_subscribe(&mut self) -> Option<ChannelEvent> {
        self.reconnect_at = None;
        let Some(game_code) = self.game_code.clone() else {
            return Some(ChannelEvent::Failed(SyncError::SessionClosed));
        };
        let mut transport = self.transport.take()?;

        self.state.status = ConnectionStatus::Connecting;
        let limit = self.config.subscribe_timeout;
        let announcement = self.announcement();
        self.in_flight = Some(Box::pin(async move {
            let result = timeout(limit, transport.subscribe(&game_code))
                .await
                .unwrap_or(Err(TransportError::Timeout("subscribe")));
            if result.is_ok() {
                let tracked = timeout(limit, transport.track(&announcement))
                    .await
                    .unwrap_or(Err(TransportError::Timeout("presence track")));
                if let Err(err) = tracked {
                    warn!(error = %err, "Failed to announce presence");
                }
            }
            (transport, Completion::Subscribed { game_code, result })
        }));
        None
    }

    fn start_track(&mut self) {
        let Some(mut transport) = self.transport.take() else {
            return;
        };
        let limit = self.config.subscribe_timeout;
        let announcement = self.announcement();
        self.in_flight = Some(Box::pin(async move {
            let result = timeout(limit, transport.track(&announcement))
                .await
                .unwrap_or(Err(TransportError::Timeout("presence track")));
            (transport, Completion::Tracked(result))
        }));
    }

    /// The disconnect is committed only after the unsubscribe finishes.
    fn check_heartbeat(&mut self) {
        let now = Instant::now();
        if !self
            .state
            .heartbeat_expired(now, self.config.heartbeat_timeout)
        {
            return;
        }
        let Some(mut transport) = self.transport.take() else {
            return;
        };

        let silent_for = now.saturating_duration_since(self.state.last_heartbeat_at);
        warn!(
            silent_ms = silent_for.as_millis() as u64,
            "No heartbeat within timeout, forcing reconnect"
        );
        let limit = self.config.subscribe_timeout;
        self.in_flight = Some(Box::pin(async move {
            if timeout(limit, transport.unsubscribe()).await.is_err() {
                warn!("Unsubscribe timed out");
            }
            let reason = "Heartbeat timeout".to_string();
            (transport, Completion::Dropped { reason })
        }));
    }

    fn on_disconnect(&mut self, reason: String) -> ChannelEvent {
        let jitter = backoff::random_jitter(self.config.max_jitter);
        match self.state.on_disconnect(reason.clone(), &self.config, jitter) {
            ReconnectDecision::Retry { attempt, delay } => {
                warn!(
                    reason = %reason,
                    attempt,
                    retry_delay_ms = delay.as_millis() as u64,
                    "Realtime channel lost, reconnecting"
                );
                self.reconnect_at = Some(Instant::now() + delay);
                ChannelEvent::Disconnected {
                    reason,
                    attempt,
                    retry_in: delay,
                }
            }
            ReconnectDecision::GiveUp { attempts } => {
                error!(attempts, "Realtime channel failed permanently");
                self.reconnect_at = None;
                ChannelEvent::Failed(SyncError::connectivity_lost(attempts))
            }
        }
    }

    fn announcement(&self) -> PresenceAnnouncement {
        PresenceAnnouncement {
            player_name: self.player_name.clone(),
            online_at: OffsetDateTime::now_utc(),
        }
    }
}

async fn next_transport_event<T: RealtimeTransport>(
    transport: Option<&mut T>,
) -> Option<TransportEvent> {
    match transport {
        Some(transport) => Some(transport.next_event().await),
        None => None,
    }
}
