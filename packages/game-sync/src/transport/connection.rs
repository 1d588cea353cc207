use std::time::Duration;

use tokio::time::Instant;

use crate::backoff;
use crate::config::TransportConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Liveness bookkeeping for one realtime channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub last_heartbeat_at: Instant,
    pub reconnect_attempts: u32,
    pub last_error: Option<String>,
    /// Set once reconnect attempts are exhausted.
    pub failed: bool,
}

/// Outcome of a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { attempt: u32, delay: Duration },
    GiveUp { attempts: u32 },
}

impl ConnectionState {
    pub fn new(now: Instant) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            last_heartbeat_at: now,
            reconnect_attempts: 0,
            last_error: None,
            failed: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    pub fn on_subscribed(&mut self, now: Instant) {
        self.status = ConnectionStatus::Connected;
        self.last_heartbeat_at = now;
        self.reconnect_attempts = 0;
        self.last_error = None;
        self.failed = false;
    }

    /// Any heartbeat, presence or inbound message proves the socket is alive.
    pub fn on_signal(&mut self, now: Instant) {
        self.last_heartbeat_at = now;
    }

    pub fn heartbeat_expired(&self, now: Instant, timeout: Duration) -> bool {
        self.is_connected() && now.saturating_duration_since(self.last_heartbeat_at) > timeout
    }

    pub fn on_disconnect(
        &mut self,
        reason: String,
        config: &TransportConfig,
        jitter: Duration,
    ) -> ReconnectDecision {
        self.status = ConnectionStatus::Disconnected;

        if self.reconnect_attempts >= config.max_attempts {
            self.failed = true;
            self.last_error = Some("Max reconnection attempts reached".to_string());
            return ReconnectDecision::GiveUp {
                attempts: self.reconnect_attempts,
            };
        }

        let delay = backoff::with_jitter(
            config.base_delay,
            self.reconnect_attempts,
            jitter,
            config.max_delay,
        );
        self.reconnect_attempts += 1;
        self.last_error = Some(reason);
        ReconnectDecision::Retry {
            attempt: self.reconnect_attempts,
            delay,
        }
    }

    /// Manual reconnect starts a fresh attempt budget.
    pub fn reset_attempts(&mut self) {
        self.reconnect_attempts = 0;
        self.failed = false;
        self.status = ConnectionStatus::Connecting;
    }
}
