use crate::traits::*;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Response shapes accepted from the polling endpoint
#[derive(Deserialize)]
#[serde(untagged)]
enum PollResponse {
    Bare(Vec<NotificationMessage>),
    Wrapped { notifications: Vec<NotificationMessage> },
}

impl PollResponse {
    fn into_batch(self) -> Vec<NotificationMessage> {
        match self {
            PollResponse::Bare(batch) => batch,
            PollResponse::Wrapped { notifications } => notifications,
        }
    }
}

/// [`PollSource`] backed by an HTTP GET endpoint
///
/// The body may be a bare JSON array of notifications or an object with a
/// `notifications` array.
pub struct HttpPollSource {
    url: Url,
    client: Client,
    bearer_token: Option<String>,
    timeout: Option<Duration>,
}

impl HttpPollSource {
    pub fn new(url: impl AsRef<str>) -> Result<Self> {
        let url = Url::parse(url.as_ref())
            .map_err(|e| DeliveryError::Configuration(format!("invalid poll url: {}", e)))?;

        Ok(Self {
            url,
            client: Client::new(),
            bearer_token: None,
            timeout: None,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl PollSource for HttpPollSource {
    async fn fetch(&self) -> Result<Vec<NotificationMessage>> {
        debug!("Polling {}", self.url);

        let mut request = self.client.get(self.url.clone());
        if let Some(ref token) = self.bearer_token {
            request = request.bearer_auth(token);
        }
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::Poll(format!("request timed out: {}", e))
            } else {
                DeliveryError::Poll(e.to_string())
            }
        })?;

        if !response.status().is_success() {
            return Err(DeliveryError::Poll(format!(
                "poll endpoint returned {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Poll(e.to_string()))?;
        let parsed: PollResponse =
            serde_json::from_str(&body).map_err(|e| DeliveryError::Parse(e.to_string()))?;

        Ok(parsed.into_batch())
    }
}
