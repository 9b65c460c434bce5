//! HTTP client for the third-party case-tracking API's refresh endpoint.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Acknowledgement of a queued refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTicket {
    pub request_id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// ISO 8601 timestamp string.
    #[serde(default)]
    pub queued_at: Option<String>,
}

/// Client for the case API.
pub struct CaseApiClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl CaseApiClient {
    /// `base_url` should be like `https://api.example.com` (a trailing slash is trimmed).
    pub fn new(base_url: String, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn refresh_url(&self, number: &str) -> String {
        format!("{}/api/processes/{}/refresh", self.base_url, number)
    }

    /// Ask the case API to re-crawl one process.
    pub async fn request_refresh(&self, number: &str) -> Result<RefreshTicket, ClientError> {
        let url = self.refresh_url(number);

        info!(url = %url, "requesting case refresh");
        let mut req = self.client.post(&url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let ticket: RefreshTicket = serde_json::from_str(&body)?;
        info!(request_id = %ticket.request_id, "refresh queued");
        Ok(ticket)
    }
}
