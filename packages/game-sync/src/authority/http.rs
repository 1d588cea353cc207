//! HTTP/JSON implementation of [`Authority`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::authority::{ActionReceipt, ActionRequest, Authority, QueuedAction};
use crate::domain::GameSnapshot;
use crate::error::{AuthorityError, AuthorityErrorKind};
use crate::errors::ErrorCode;

/// Subset of the authority's problem-details error body.
#[derive(Debug, Default, Deserialize)]
struct Problem {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

pub struct HttpAuthority {
    client: Client,
    base_url: String,
}

impl HttpAuthority {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthorityError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| AuthorityError::network(err.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, game_code: &str, path: &str) -> String {
        format!("{}/api/games/{game_code}/{path}", self.base_url)
    }
}

fn transport_error(err: reqwest::Error) -> AuthorityError {
    AuthorityError::network(err.to_string())
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AuthorityError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(transport_error);
    }
    let problem = response.json::<Problem>().await.unwrap_or_default();
    Err(classify(status, problem))
}

fn classify(status: StatusCode, problem: Problem) -> AuthorityError {
    let code = problem.code.as_deref().and_then(ErrorCode::parse);
    let message = problem
        .detail
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    let kind = match (code, status) {
        (Some(ErrorCode::OptimisticLock), _) | (_, StatusCode::CONFLICT) => {
            AuthorityErrorKind::Conflict
        }
        (Some(ErrorCode::GameBusy), _)
        | (_, StatusCode::LOCKED)
        | (_, StatusCode::TOO_MANY_REQUESTS)
        | (_, StatusCode::SERVICE_UNAVAILABLE) => AuthorityErrorKind::Busy,
        (_, StatusCode::BAD_REQUEST) | (_, StatusCode::UNPROCESSABLE_ENTITY) => {
            AuthorityErrorKind::Validation
        }
        (_, StatusCode::NOT_FOUND) => AuthorityErrorKind::NotFound,
        _ if status.is_client_error() => AuthorityErrorKind::Validation,
        _ => AuthorityErrorKind::Network,
    };

    let err = AuthorityError::new(kind, message);
    match code {
        Some(code) => err.with_code(code),
        None => err,
    }
}

#[async_trait]
impl Authority for HttpAuthority {
    async fn fetch_snapshot(&self, game_code: &str) -> Result<GameSnapshot, AuthorityError> {
        let response = self
            .client
            .get(self.url(game_code, "snapshot"))
            .send()
            .await
            .map_err(transport_error)?;
        let snapshot: GameSnapshot = read_json(response).await?;
        debug!(game_code, version = snapshot.version, "Fetched snapshot");
        Ok(snapshot)
    }

    async fn submit_action(&self, request: &ActionRequest) -> Result<ActionReceipt, AuthorityError> {
        let response = self
            .client
            .post(self.url(&request.game_code, "actions"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn fetch_action_queue(
        &self,
        game_code: &str,
    ) -> Result<Option<Vec<QueuedAction>>, AuthorityError> {
        let response = self
            .client
            .get(self.url(game_code, "actions/pending"))
            .send()
            .await
            .map_err(transport_error)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        read_json(response).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(code: &str) -> Problem {
        Problem {
            code: Some(code.to_string()),
            detail: Some("detail".to_string()),
        }
    }

    #[test]
    fn statuses_map_to_error_kinds() {
        let cases = [
            (StatusCode::CONFLICT, AuthorityErrorKind::Conflict),
            (StatusCode::LOCKED, AuthorityErrorKind::Busy),
            (StatusCode::TOO_MANY_REQUESTS, AuthorityErrorKind::Busy),
            (StatusCode::SERVICE_UNAVAILABLE, AuthorityErrorKind::Busy),
            (StatusCode::BAD_REQUEST, AuthorityErrorKind::Validation),
            (StatusCode::UNPROCESSABLE_ENTITY, AuthorityErrorKind::Validation),
            (StatusCode::NOT_FOUND, AuthorityErrorKind::NotFound),
            (StatusCode::BAD_GATEWAY, AuthorityErrorKind::Network),
        ];
        for (status, kind) in cases {
            assert_eq!(classify(status, Problem::default()).kind, kind, "{status}");
        }
    }

    #[test]
    fn problem_codes_take_precedence_over_status() {
        let busy = classify(StatusCode::INTERNAL_SERVER_ERROR, problem("GAME_BUSY"));
        assert_eq!(busy.kind, AuthorityErrorKind::Busy);
        assert_eq!(busy.code, Some(ErrorCode::GameBusy));

        let lock = classify(StatusCode::BAD_REQUEST, problem("OPTIMISTIC_LOCK"));
        assert_eq!(lock.kind, AuthorityErrorKind::Conflict);
        assert_eq!(lock.message, "detail");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let authority = HttpAuthority::with_client(Client::new(), "http://localhost:3001/");
        assert_eq!(
            authority.url("ABCD", "snapshot"),
            "http://localhost:3001/api/games/ABCD/snapshot"
        );
    }
}
