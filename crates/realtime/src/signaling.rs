//! Offer/answer exchange with the remote service's signaling endpoint.

use crate::{credential::Credential, error::NegotiationError};
use async_trait::async_trait;
use reqwest::{
    Url,
    header::{AUTHORIZATION, CONTENT_TYPE},
};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionKind {
    Offer,
    Answer,
}

/// A session description. The SDP body is opaque and applied verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: DescriptionKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: DescriptionKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Sends the local offer and returns the remote answer. Consumes the credential.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Signaling: Send + Sync {
    async fn exchange(
        &self,
        credential: Credential,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError>;
}

#[derive(Debug, Clone)]
pub struct HttpSignaling {
    client: reqwest::Client,
    url: Url,
    model: String,
}

impl HttpSignaling {
    pub fn new(url: Url, model: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url, model)
    }

    pub fn with_client(client: reqwest::Client, url: Url, model: impl Into<String>) -> Self {
        Self {
            client,
            url,
            model: model.into(),
        }
    }

    fn endpoint(&self) -> Url {
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("model", &self.model);
        url
    }
}

#[async_trait]
impl Signaling for HttpSignaling {
    #[instrument(skip_all, fields(model = %self.model, lesson_id = %credential.lesson_id))]
    async fn exchange(
        &self,
        credential: Credential,
        offer: SessionDescription,
    ) -> Result<SessionDescription, NegotiationError> {
        let response = self
            .client
            .post(self.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", credential.token()))
            .header(CONTENT_TYPE, "application/sdp")
            .body(offer.sdp)
            .send()
            .await
            .map_err(NegotiationError::Unreachable)?;
        drop(credential);

        let status = response.status();
        let body = response.text().await.map_err(NegotiationError::Unreachable)?;
        if !status.is_success() {
            warn!(status = status.as_u16(), "Signaling endpoint rejected offer");
            return Err(NegotiationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(answer_len = body.len(), "Received remote description");
        Ok(SessionDescription::answer(body))
    }
}
