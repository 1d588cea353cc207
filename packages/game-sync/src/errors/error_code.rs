//! Stable error codes surfaced to consumers of the sync core.
//!
//! Codes are SCREAMING_SNAKE_CASE and double as the problem-details `code`
//! values the authority sends back, so the UI can render a message per code.
//! Add new codes here; never pass ad-hoc strings as error codes.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Transient
    /// Transport or authority unreachable
    NetworkError,
    /// Authority is mid-transaction for this game
    GameBusy,

    // Terminal for the action
    /// Expected version did not match the authority's version
    OptimisticLock,
    /// Generic conflict reported by the authority
    Conflict,
    /// Action is illegal in the current authoritative state
    ValidationError,
    /// Game or lobby code unknown to the authority
    GameNotFound,

    // Terminal for the session
    /// Recovery attempts exhausted; a reload is required
    RecoveryExhausted,
    /// Realtime channel gave up reconnecting
    ConnectivityLost,

    // Local
    /// No authoritative snapshot has been loaded yet
    NotReady,
    /// The session was torn down
    SessionClosed,
    /// Invalid or missing configuration
    ConfigError,
    /// Malformed message from the transport
    ProtocolError,
}

impl ErrorCode {
    /// Canonical string for this code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::GameBusy => "GAME_BUSY",

            Self::OptimisticLock => "OPTIMISTIC_LOCK",
            Self::Conflict => "CONFLICT",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::GameNotFound => "GAME_NOT_FOUND",

            Self::RecoveryExhausted => "RECOVERY_EXHAUSTED",
            Self::ConnectivityLost => "CONNECTIVITY_LOST",

            Self::NotReady => "NOT_READY",
            Self::SessionClosed => "SESSION_CLOSED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
        }
    }

    /// Look up a code from the string the authority sent.
    pub fn parse(code: &str) -> Option<Self> {
        ALL.iter().copied().find(|candidate| candidate.as_str() == code)
    }
}

pub(crate) const ALL: [ErrorCode; 12] = [
    ErrorCode::NetworkError,
    ErrorCode::GameBusy,
    ErrorCode::OptimisticLock,
    ErrorCode::Conflict,
    ErrorCode::ValidationError,
    ErrorCode::GameNotFound,
    ErrorCode::RecoveryExhausted,
    ErrorCode::ConnectivityLost,
    ErrorCode::NotReady,
    ErrorCode::SessionClosed,
    ErrorCode::ConfigError,
    ErrorCode::ProtocolError,
];

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
