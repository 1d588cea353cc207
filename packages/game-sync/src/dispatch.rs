//! Action submission with busy-retry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::authority::{ActionReceipt, ActionRequest, Authority};
use crate::backoff;
use crate::config::DispatchConfig;
use crate::error::{AuthorityErrorKind, SyncError};

/// A submission the authority accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatched {
    pub receipt: ActionReceipt,
    /// Busy responses absorbed before acceptance.
    pub busy_retries: u32,
}

/// Mediates the network exchange for one action; owns no game state.
#[derive(Clone)]
pub struct ActionDispatcher {
    authority: Arc<dyn Authority>,
    config: DispatchConfig,
}

impl ActionDispatcher {
    pub fn new(authority: Arc<dyn Authority>, config: DispatchConfig) -> Self {
        Self { authority, config }
    }

    /// Submit `request`, retrying while the authority reports it is busy.
    ///
    /// The busy delay is `min(base * 2^pending_count, cap)`. Conflict and
    /// validation errors return immediately; network errors are returned for
    /// the caller to start recovery instead of retrying blindly.
    pub async fn dispatch(
        &self,
        request: &ActionRequest,
        pending_count: usize,
    ) -> Result<Dispatched, SyncError> {
        let exponent = u32::try_from(pending_count).unwrap_or(u32::MAX);
        let mut busy_retries = 0u32;

        loop {
            match self.authority.submit_action(request).await {
                Ok(receipt) => {
                    info!(
                        game_code = %request.game_code,
                        action_type = %request.action_type,
                        action_id = %receipt.action_id,
                        expected_version = request.expected_version,
                        busy_retries,
                        "Action accepted"
                    );
                    return Ok(Dispatched {
                        receipt,
                        busy_retries,
                    });
                }
                Err(err) if err.kind == AuthorityErrorKind::Busy => {
                    if busy_retries >= self.config.max_busy_retries {
                        warn!(
                            action_id = %request.client_action_id,
                            busy_retries,
                            "Authority still busy, giving up on action"
                        );
                        return Err(err.into());
                    }
                    let delay = backoff::exponential(
                        self.config.busy_base_delay,
                        exponent,
                        self.config.busy_max_delay,
                    );
                    busy_retries += 1;
                    debug!(
                        action_id = %request.client_action_id,
                        pending_count,
                        attempt = busy_retries,
                        delay_ms = delay.as_millis() as u64,
                        "Authority busy, retrying action"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    warn!(
                        action_id = %request.client_action_id,
                        kind = ?err.kind,
                        error = %err.message,
                        "Action submission failed"
                    );
                    return Err(err.into());
                }
            }
        }
    }
}
