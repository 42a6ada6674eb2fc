use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::BackendError;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Serialize)]
struct StartRequest<'a> {
    role: &'a str,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    session_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: Option<serde_json::Value>,
}

/// Reply to `POST /start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReply {
    pub session_id: String,
    pub reply: String,
}

/// Reply to `POST /message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReply {
    pub reply: String,
    #[serde(default)]
    pub history_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    #[serde(default)]
    pub active_sessions: usize,
}

/// The two calls the interview state machine needs from a backend.
#[async_trait]
pub trait InterviewBackend: Send + Sync {
    async fn start_session(&self, role: &str) -> Result<StartReply, BackendError>;

    async fn send_answer(&self, session_id: &str, text: &str) -> Result<MessageReply, BackendError>;
}

#[derive(Clone)]
pub struct BackendClient {
    client: Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<Health, BackendError> {
        let url = format!("{}/health", self.base_url);
        let response = check_status(self.client.get(&url).send().await?).await?;
        decode(response).await
    }

    /// Ask the backend to forget a session. Unknown ids come back as 404.
    pub async fn end_session(&self, session_id: &str) -> Result<(), BackendError> {
        let url = self.session_url(session_id)?;
        check_status(self.client.delete(url).send().await?).await?;
        debug!(session_id, "backend session ended");
        Ok(())
    }

    /// `{base}/session/{id}` with the id percent-encoded as one path segment.
    fn session_url(&self, session_id: &str) -> Result<Url, BackendError> {
        let invalid = |reason: String| BackendError::InvalidUrl {
            url: self.base_url.clone(),
            reason,
        };

        let mut url = Url::parse(&self.base_url).map_err(|err| invalid(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid("cannot hold a path".into()))?
            .pop_if_empty()
            .extend(["session", session_id]);
        Ok(url)
    }
}

#[async_trait]
impl InterviewBackend for BackendClient {
    async fn start_session(&self, role: &str) -> Result<StartReply, BackendError> {
        let url = format!("{}/start", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&StartRequest { role })
            .send()
            .await?;

        let reply: StartReply = decode(check_status(response).await?).await?;
        debug!(session_id = %reply.session_id, "backend session opened");
        Ok(reply)
    }

    async fn send_answer(&self, session_id: &str, text: &str) -> Result<MessageReply, BackendError> {
        let url = format!("{}/message", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&MessageRequest { session_id, text })
            .send()
            .await?;

        decode(check_status(response).await?).await
    }
}

/// Turn a non-2xx response into [`BackendError::Status`], keeping the
/// backend's `detail` message when the body carries one.
async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.detail)
        .map(|d| match d {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        })
        .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()));

    Err(BackendError::Status { status, detail })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_is_one_escaped_segment() {
        let client = BackendClient::new("http://127.0.0.1:8000/api/");
        let url = client.session_url("a/b c?d").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/api/session/a%2Fb%20c%3Fd");
    }

    #[test]
    fn test_bad_base_url_is_reported() {
        let client = BackendClient::new("not a url");
        assert!(matches!(
            client.session_url("s1"),
            Err(BackendError::InvalidUrl { ref url, .. }) if url == "not a url"
        ));
    }
}
