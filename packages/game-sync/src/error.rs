use thiserror::Error;

use crate::errors::ErrorCode;

/// Errors surfaced to consumers of a game session.
///
/// Transient kinds (`Network`, `Busy`) are retried internally and reach the
/// consumer only as a "reconnecting" / "please wait" signal. Terminal kinds are
/// always surfaced with a stable [`ErrorCode`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("Network error: {detail}")]
    Network { detail: String },
    #[error("Conflict: {detail}")]
    Conflict { code: ErrorCode, detail: String },
    #[error("Game busy: {detail}")]
    Busy { detail: String },
    #[error("Validation error: {detail}")]
    Validation { code: ErrorCode, detail: String },
    #[error("Fatal: {detail}")]
    Fatal { code: ErrorCode, detail: String },
    #[error("No authoritative snapshot loaded yet")]
    NotReady,
    #[error("Session closed")]
    SessionClosed,
}

impl SyncError {
    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network {
            detail: detail.into(),
        }
    }

    pub fn busy(detail: impl Into<String>) -> Self {
        Self::Busy {
            detail: detail.into(),
        }
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::Validation {
            code: ErrorCode::ValidationError,
            detail: detail.into(),
        }
    }

    pub fn conflict(detail: impl Into<String>) -> Self {
        Self::Conflict {
            code: ErrorCode::OptimisticLock,
            detail: detail.into(),
        }
    }

    pub fn recovery_exhausted(attempts: u32) -> Self {
        Self::Fatal {
            code: ErrorCode::RecoveryExhausted,
            detail: format!("Unable to recover after {attempts} attempts, please reload"),
        }
    }

    pub fn connectivity_lost(attempts: u32) -> Self {
        Self::Fatal {
            code: ErrorCode::ConnectivityLost,
            detail: format!("Max reconnection attempts reached ({attempts})"),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SyncError::Network { .. } => ErrorCode::NetworkError,
            SyncError::Conflict { code, .. } => *code,
            SyncError::Busy { .. } => ErrorCode::GameBusy,
            SyncError::Validation { code, .. } => *code,
            SyncError::Fatal { code, .. } => *code,
            SyncError::NotReady => ErrorCode::NotReady,
            SyncError::SessionClosed => ErrorCode::SessionClosed,
        }
    }

    /// Whether retrying the same request can never succeed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SyncError::Network { .. } | SyncError::Busy { .. })
    }
}

/// Failure categories reported by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityErrorKind {
    Network,
    Conflict,
    Busy,
    Validation,
    NotFound,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind:?}: {message}")]
pub struct AuthorityError {
    pub kind: AuthorityErrorKind,
    pub code: Option<ErrorCode>,
    pub message: String,
}

impl AuthorityError {
    pub fn new(kind: AuthorityErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
        }
    }

    pub fn with_code(mut self, code: ErrorCode) -> Self {
        self.code = Some(code);
        self
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(AuthorityErrorKind::Network, message)
    }

    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(AuthorityErrorKind::Busy, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(AuthorityErrorKind::Conflict, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(AuthorityErrorKind::Validation, message)
    }
}

impl From<AuthorityError> for SyncError {
    fn from(err: AuthorityError) -> Self {
        match err.kind {
            AuthorityErrorKind::Network => SyncError::Network {
                detail: err.message,
            },
            AuthorityErrorKind::Busy => SyncError::Busy {
                detail: err.message,
            },
            AuthorityErrorKind::Conflict => SyncError::Conflict {
                code: err.code.unwrap_or(ErrorCode::OptimisticLock),
                detail: err.message,
            },
            AuthorityErrorKind::Validation => SyncError::Validation {
                code: err.code.unwrap_or(ErrorCode::ValidationError),
                detail: err.message,
            },
            AuthorityErrorKind::NotFound => SyncError::Validation {
                code: ErrorCode::GameNotFound,
                detail: err.message,
            },
        }
    }
}

/// Failures of the realtime transport itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connect failed: {0}")]
    Connect(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("Transport closed")]
    Closed,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {detail}")]
    Invalid { var: &'static str, detail: String },
}
