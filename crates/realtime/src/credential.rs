//! Credential Exchange: short-lived session tokens from the local backend.

use crate::error::{CREDENTIAL_FALLBACK_MESSAGE, CredentialError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};

/// A single-use, time-limited token scoped to one lesson.
///
/// Not `Clone`: it is handed to signaling by value and dropped there.
#[derive(Debug)]
pub struct Credential {
    token: SecretString,
    pub expires_at: Option<DateTime<Utc>>,
    pub lesson_id: String,
}

impl Credential {
    pub fn new(
        token: impl Into<String>,
        expires_at: Option<DateTime<Utc>>,
        lesson_id: impl Into<String>,
    ) -> Self {
        Self {
            token: SecretString::from(token.into()),
            expires_at,
            lesson_id: lesson_id.into(),
        }
    }

    pub fn token(&self) -> &str {
        self.token.expose_secret()
    }
}

/// Issues credentials. One call, one network request, no retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn issue(&self, lesson_id: &str) -> Result<Credential, CredentialError>;
}

#[derive(Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    expires_at: Option<i64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Talks to the credential backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCredentialExchange {
    client: reqwest::Client,
    url: Url,
}

impl HttpCredentialExchange {
    pub fn new(url: Url) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl CredentialSource for HttpCredentialExchange {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn issue(&self, lesson_id: &str) -> Result<Credential, CredentialError> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "slug": lesson_id }))
            .send()
            .await
            .map_err(CredentialError::Unreachable)?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorResponse>()
                .await
                .ok()
                .and_then(|body| body.error)
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| CREDENTIAL_FALLBACK_MESSAGE.to_string());
            warn!(status = status.as_u16(), %message, "Credential backend rejected request");
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::MalformedResponse(e.to_string()))?;
        if body.token.is_empty() {
            return Err(CredentialError::MalformedResponse("missing token".to_string()));
        }
        let expires_at = body.expires_at.and_then(|secs| DateTime::from_timestamp(secs, 0));

        info!(?expires_at, "Issued session credential");
        Ok(Credential::new(body.token, expires_at, lesson_id))
    }
}

/// Hands out a fixed token. Used for offline replay.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: SecretString,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredentials {
    async fn issue(&self, lesson_id: &str) -> Result<Credential, CredentialError> {
        Ok(Credential::new(self.token.expose_secret(), None, lesson_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_output_redacts_token() {
        let credential = Credential::new("ek_live_secret", None, "binary-search");
        let rendered = format!("{credential:?}");
        assert!(!rendered.contains("ek_live_secret"));
        assert_eq!(credential.token(), "ek_live_secret");
    }

    #[tokio::test]
    async fn test_static_credentials_scope_to_lesson() {
        let source = StaticCredentials::new("replay");
        let credential = source.issue("merge-sort").await.unwrap();
        assert_eq!(credential.lesson_id, "merge-sort");
        assert_eq!(credential.token(), "replay");
        assert!(credential.expires_at.is_none());
    }
}
