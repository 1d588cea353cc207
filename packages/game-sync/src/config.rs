//! Runtime configuration for a game session.
//!
//! Every knob has a default; [`SyncConfig::from_env`] overrides them from
//! `GAME_SYNC_*` environment variables. Durations are read as milliseconds.

use std::env;
use std::time::Duration;

use crate::error::ConfigError;

/// Realtime channel reconnect and liveness settings.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    /// First reconnect delay, doubled per attempt. Default: 1 s.
    pub base_delay: Duration,
    /// Upper bound on any reconnect delay. Default: 30 s.
    pub max_delay: Duration,
    /// Upper bound of the random jitter added to each delay. Default: 1000 ms.
    pub max_jitter: Duration,
    /// Reconnect attempts before the channel reports itself failed. Default: 10.
    pub max_attempts: u32,
    /// How often the heartbeat watchdog runs. Default: 10 s.
    pub heartbeat_interval: Duration,
    /// Silence after which the watchdog forces a reconnect. Default: 30 s.
    pub heartbeat_timeout: Duration,
    /// How often local presence is re-tracked while connected. Default: 15 s.
    pub presence_refresh: Duration,
    /// Deadline for the subscribe handshake. Default: 10 s.
    pub subscribe_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_jitter: Duration::from_millis(1000),
            max_attempts: 10,
            heartbeat_interval: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(30),
            presence_refresh: Duration::from_secs(15),
            subscribe_timeout: Duration::from_secs(10),
        }
    }
}

/// Busy-retry settings for action submission.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    pub busy_base_delay: Duration,
    pub busy_max_delay: Duration,
    /// Busy responses tolerated before the submission is surfaced as busy.
    pub max_busy_retries: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            busy_base_delay: Duration::from_millis(250),
            busy_max_delay: Duration::from_millis(5000),
            max_busy_retries: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Failed refetches before the session is marked degraded. Default: 5.
    pub max_attempts: u32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresenceConfig {
    /// Seen within this window counts as online. Default: 30 s.
    pub online_within: Duration,
    /// Seen within this window counts as idle; beyond it, away. Default: 120 s.
    pub idle_within: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            online_within: Duration::from_secs(30),
            idle_within: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnTimeoutConfig {
    pub enabled: bool,
    /// How long the turn owner may be away before a skip is submitted.
    pub timeout: Duration,
    pub check_interval: Duration,
}

impl Default for TurnTimeoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(30),
            check_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncConfig {
    pub transport: TransportConfig,
    pub dispatch: DispatchConfig,
    pub recovery: RecoveryConfig,
    pub presence: PresenceConfig,
    pub turn_timeout: TurnTimeoutConfig,
}

impl SyncConfig {
    /// Defaults overridden by any `GAME_SYNC_*` variables that are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let t = &mut config.transport;
        override_ms("GAME_SYNC_RECONNECT_BASE_MS", &mut t.base_delay)?;
        override_ms("GAME_SYNC_RECONNECT_MAX_MS", &mut t.max_delay)?;
        override_ms("GAME_SYNC_RECONNECT_JITTER_MS", &mut t.max_jitter)?;
        override_u32("GAME_SYNC_RECONNECT_MAX_ATTEMPTS", &mut t.max_attempts)?;
        override_ms("GAME_SYNC_HEARTBEAT_INTERVAL_MS", &mut t.heartbeat_interval)?;
        override_ms("GAME_SYNC_HEARTBEAT_TIMEOUT_MS", &mut t.heartbeat_timeout)?;
        override_ms("GAME_SYNC_PRESENCE_REFRESH_MS", &mut t.presence_refresh)?;
        override_ms("GAME_SYNC_SUBSCRIBE_TIMEOUT_MS", &mut t.subscribe_timeout)?;

        let d = &mut config.dispatch;
        override_ms("GAME_SYNC_BUSY_BASE_MS", &mut d.busy_base_delay)?;
        override_ms("GAME_SYNC_BUSY_MAX_MS", &mut d.busy_max_delay)?;
        override_u32("GAME_SYNC_BUSY_MAX_RETRIES", &mut d.max_busy_retries)?;

        let r = &mut config.recovery;
        override_ms("GAME_SYNC_RECOVERY_BASE_MS", &mut r.base_delay)?;
        override_ms("GAME_SYNC_RECOVERY_MAX_MS", &mut r.max_delay)?;
        override_u32("GAME_SYNC_RECOVERY_MAX_ATTEMPTS", &mut r.max_attempts)?;

        let p = &mut config.presence;
        override_ms("GAME_SYNC_PRESENCE_ONLINE_MS", &mut p.online_within)?;
        override_ms("GAME_SYNC_PRESENCE_IDLE_MS", &mut p.idle_within)?;

        let tt = &mut config.turn_timeout;
        override_bool("GAME_SYNC_TURN_TIMEOUT_ENABLED", &mut tt.enabled)?;
        override_ms("GAME_SYNC_TURN_TIMEOUT_MS", &mut tt.timeout)?;
        override_ms("GAME_SYNC_TURN_CHECK_MS", &mut tt.check_interval)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.presence.online_within > self.presence.idle_within {
            return Err(ConfigError::Invalid {
                var: "GAME_SYNC_PRESENCE_ONLINE_MS",
                detail: "online window must not exceed idle window".to_string(),
            });
        }
        if self.transport.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "GAME_SYNC_HEARTBEAT_INTERVAL_MS",
                detail: "must be greater than zero".to_string(),
            });
        }
        if self.transport.presence_refresh.is_zero() {
            return Err(ConfigError::Invalid {
                var: "GAME_SYNC_PRESENCE_REFRESH_MS",
                detail: "must be greater than zero".to_string(),
            });
        }
        if self.turn_timeout.check_interval.is_zero() {
            return Err(ConfigError::Invalid {
                var: "GAME_SYNC_TURN_CHECK_MS",
                detail: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn optional_var(var: &'static str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

fn override_ms(var: &'static str, slot: &mut Duration) -> Result<(), ConfigError> {
    if let Some(raw) = optional_var(var) {
        let ms = raw.trim().parse::<u64>().map_err(|err| ConfigError::Invalid {
            var,
            detail: format!("expected milliseconds, got '{raw}': {err}"),
        })?;
        *slot = Duration::from_millis(ms);
    }
    Ok(())
}

fn override_u32(var: &'static str, slot: &mut u32) -> Result<(), ConfigError> {
    if let Some(raw) = optional_var(var) {
        *slot = raw.trim().parse::<u32>().map_err(|err| ConfigError::Invalid {
            var,
            detail: format!("expected integer, got '{raw}': {err}"),
        })?;
    }
    Ok(())
}

fn override_bool(var: &'static str, slot: &mut bool) -> Result<(), ConfigError> {
    if let Some(raw) = optional_var(var) {
        *slot = match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            other => {
                return Err(ConfigError::Invalid {
                    var,
                    detail: format!("expected boolean, got '{other}'"),
                })
            }
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = SyncConfig::default();
        assert_eq!(config.transport.max_attempts, 10);
        assert_eq!(config.transport.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.transport.heartbeat_timeout, Duration::from_secs(30));
        assert_eq!(config.dispatch.busy_max_delay, Duration::from_millis(5000));
        assert_eq!(config.recovery.max_attempts, 5);
        assert_eq!(config.recovery.max_delay, Duration::from_secs(30));
        assert_eq!(config.presence.online_within, Duration::from_secs(30));
        assert_eq!(config.presence.idle_within, Duration::from_secs(120));
        assert_eq!(config.turn_timeout.timeout, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_presence_windows() {
        let mut config = SyncConfig::default();
        config.presence.online_within = Duration::from_secs(200);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var: "GAME_SYNC_PRESENCE_ONLINE_MS", .. })
        ));
    }

    #[test]
    fn validate_rejects_zero_periods() {
        let mut config = SyncConfig::default();
        config.transport.presence_refresh = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var: "GAME_SYNC_PRESENCE_REFRESH_MS", .. })
        ));

        let mut config = SyncConfig::default();
        config.transport.heartbeat_interval = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { var: "GAME_SYNC_HEARTBEAT_INTERVAL_MS", .. })
        ));
    }

    #[test]
    fn env_overrides_are_parsed() {
        env::set_var("GAME_SYNC_TEST_ONLY_MS", "2500");
        let mut slot = Duration::ZERO;
        override_ms("GAME_SYNC_TEST_ONLY_MS", &mut slot).unwrap();
        assert_eq!(slot, Duration::from_millis(2500));

        env::set_var("GAME_SYNC_TEST_ONLY_BAD_MS", "soon");
        let err = override_ms("GAME_SYNC_TEST_ONLY_BAD_MS", &mut slot).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        env::set_var("GAME_SYNC_TEST_ONLY_FLAG", "off");
        let mut flag = true;
        override_bool("GAME_SYNC_TEST_ONLY_FLAG", &mut flag).unwrap();
        assert!(!flag);
    }
}
