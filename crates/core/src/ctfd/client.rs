//! CTFd REST API client.
//!
//! All endpoints live under `{base}/api/v1/` and wrap their payload in
//! `{"data": ...}`. Admin tokens are sent as `Authorization: Token <token>`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, warn};

use crate::config::CtfdConfig;

use super::types::{ChallengeDetail, ChallengeSummary, CtfdTeam, CtfdUser, Envelope};
use super::{CtfdError, ScoringApi};

/// CTFd API client.
pub struct CtfdClient {
    client: Client,
    base_url: String,
}

impl CtfdClient {
    /// Create a client from config.
    ///
    /// Fails with `NotConfigured` when the URL is missing or the token is
    /// empty, a placeholder, or looks like a URL.
    pub fn new(config: &CtfdConfig) -> Result<Self, CtfdError> {
        let base_url = config.url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(CtfdError::NotConfigured("CTFd URL is empty".to_string()));
        }
        if let Some(problem) = config.token_problem() {
            return Err(CtfdError::NotConfigured(problem.to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!(
            "{} {}",
            config.auth_scheme.trim(),
            config.api_token.trim()
        ))
        .map_err(|_| {
            CtfdError::NotConfigured("CTFd API token contains invalid characters".to_string())
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| CtfdError::NotConfigured(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, endpoint)
    }

    /// GET an endpoint and unwrap its `data` field.
    ///
    /// `Ok(None)` means the server answered without usable data.
    async fn get_data<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, CtfdError> {
        let url = self.endpoint_url(endpoint);
        debug!("CTFd GET {}", url);

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!("CTFd request timed out: {}", url);
                } else {
                    error!("Cannot connect to CTFd at {}: {}", self.base_url, e);
                }
                CtfdError::Connection(e.to_string())
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => {
                error!("CTFd rejected the API token (401); check that it is valid, unexpired and has admin rights");
                return Err(CtfdError::Unauthorized);
            }
            StatusCode::FORBIDDEN => {
                warn!("CTFd denied access (403): {}", endpoint);
                return Ok(None);
            }
            StatusCode::NOT_FOUND => {
                warn!("CTFd endpoint not found (404): {}", url);
                return Ok(None);
            }
            s if !s.is_success() => {
                warn!("CTFd request failed with status {}: {}", s.as_u16(), endpoint);
                return Ok(None);
            }
            _ => {}
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| CtfdError::Parse(format!("{}: {}", endpoint, e)))?;

        Ok(envelope.data)
    }
}

#[async_trait]
impl ScoringApi for CtfdClient {
    async fn current_user(&self) -> Result<Option<CtfdUser>, CtfdError> {
        self.get_data("users/me", &[]).await
    }

    async fn challenges(&self) -> Result<Vec<ChallengeSummary>, CtfdError> {
        Ok(self.get_data("challenges", &[]).await?.unwrap_or_default())
    }

    async fn challenge(&self, challenge_id: u64) -> Result<Option<ChallengeDetail>, CtfdError> {
        self.get_data(&format!("challenges/{}", challenge_id), &[])
            .await
    }

    async fn solves(&self, challenge_id: u64) -> Result<Vec<serde_json::Value>, CtfdError> {
        Ok(self
            .get_data(&format!("challenges/{}/solves", challenge_id), &[])
            .await?
            .unwrap_or_default())
    }

    async fn correct_submissions(
        &self,
        challenge_id: u64,
    ) -> Result<Vec<serde_json::Value>, CtfdError> {
        Ok(self
            .get_data(
                "submissions",
                &[
                    ("challenge_id", challenge_id.to_string()),
                    ("type", "correct".to_string()),
                ],
            )
            .await?
            .unwrap_or_default())
    }

    async fn user(&self, user_id: u64) -> Result<Option<CtfdUser>, CtfdError> {
        self.get_data(&format!("users/{}", user_id), &[]).await
    }

    async fn team(&self, team_id: u64) -> Result<Option<CtfdTeam>, CtfdError> {
        self.get_data(&format!("teams/{}", team_id), &[]).await
    }
}
