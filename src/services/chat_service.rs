//! Chat backend collaborator.
//!
//! Activities get one channel each (`activity-<activity_id>`). The core only
//! ever talks to the backend through [`ChatNotifier`], and every failure is
//! reported as a [`ChatError`] that callers log and move past.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, HOST};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat backend is not configured")]
    Disabled,

    #[error("chat backend did not answer within {0:?}")]
    Timeout(Duration),

    #[error("could not reach chat backend at {url}: {detail}")]
    Connect { url: String, detail: String },

    #[error("chat backend answered {status}")]
    Upstream { status: StatusCode, body: Option<Value> },

    #[error("unexpected chat backend response: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatUser {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatToken {
    pub token: String,
    pub user: ChatUser,
}

pub fn channel_id_for(activity_id: &str) -> String {
    format!("activity-{}", activity_id)
}

#[async_trait]
pub trait ChatNotifier: Send + Sync {
    /// Creates the activity channel with the host as first member and returns
    /// the channel id to persist.
    async fn create_channel(
        &self,
        activity_id: &str,
        title: &str,
        host_id: &str,
    ) -> Result<String, ChatError>;

    async fn add_member(
        &self,
        channel_id: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), ChatError>;

    async fn remove_member(&self, channel_id: &str, user_id: &str) -> Result<(), ChatError>;

    async fn issue_token(&self, user_id: &str, display_name: &str) -> Result<ChatToken, ChatError>;

    async fn fetch_channel_state(&self, channel_id: &str) -> Result<Value, ChatError>;
}

/// Stand-in when no chat backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledChat;

#[async_trait]
impl ChatNotifier for DisabledChat {
    async fn create_channel(&self, _: &str, _: &str, _: &str) -> Result<String, ChatError> {
        Err(ChatError::Disabled)
    }

    async fn add_member(&self, _: &str, _: &str, _: &str) -> Result<(), ChatError> {
        Err(ChatError::Disabled)
    }

    async fn remove_member(&self, _: &str, _: &str) -> Result<(), ChatError> {
        Err(ChatError::Disabled)
    }

    async fn issue_token(&self, _: &str, _: &str) -> Result<ChatToken, ChatError> {
        Err(ChatError::Disabled)
    }

    async fn fetch_channel_state(&self, _: &str) -> Result<Value, ChatError> {
        Err(ChatError::Disabled)
    }
}

/// Runs a chat call with an upper bound on its latency.
pub async fn bounded<T>(
    limit: Duration,
    call: impl std::future::Future<Output = Result<T, ChatError>>,
) -> Result<T, ChatError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ChatError::Timeout(limit)),
    }
}

pub struct HttpChatNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    host_header: Option<String>,
}

impl HttpChatNotifier {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        host_header: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            host_header,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(value) = self
            .api_key
            .as_deref()
            .and_then(|key| HeaderValue::from_str(&format!("Bearer {}", key)).ok())
        {
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(value) = self
            .host_header
            .as_deref()
            .and_then(|host| HeaderValue::from_str(host).ok())
        {
            headers.insert(HOST, value);
        }
        headers
    }

    async fn send(&self, url: &str, request: reqwest::RequestBuilder) -> Result<Value, ChatError> {
        let resp = request
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| connect_failed(url, e))?;

        let status =
            StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
        let bytes = resp.bytes().await.map_err(|e| connect_failed(url, e))?;
        let body: Option<Value> = if bytes.is_empty() {
            None
        } else {
            serde_json::from_slice(&bytes).ok()
        };

        if !status.is_success() {
            return Err(ChatError::Upstream { status, body });
        }
        Ok(body.unwrap_or(Value::Null))
    }
}

fn connect_failed(url: &str, err: impl ToString) -> ChatError {
    ChatError::Connect {
        url: url.to_string(),
        detail: err.to_string(),
    }
}

#[async_trait]
impl ChatNotifier for HttpChatNotifier {
    async fn create_channel(
        &self,
        activity_id: &str,
        title: &str,
        host_id: &str,
    ) -> Result<String, ChatError> {
        let channel_id = channel_id_for(activity_id);
        let url = self.url("channels");
        let body = self
            .send(
                &url,
                self.client.post(&url).json(&serde_json::json!({
                    "channel_id": channel_id,
                    "name": title,
                    "members": [host_id],
                    "created_by_id": host_id,
                    "activity_id": activity_id,
                })),
            )
            .await?;

        // Older backends answer with an empty body; the id is ours anyway.
        Ok(body
            .get("channel_id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or(channel_id))
    }

    async fn add_member(
        &self,
        channel_id: &str,
        user_id: &str,
        display_name: &str,
    ) -> Result<(), ChatError> {
        let url = self.url(&format!("channels/{}/members", channel_id));
        self.send(
            &url,
            self.client.post(&url).json(&serde_json::json!({
                "members": [{ "user_id": user_id, "name": display_name }],
            })),
        )
        .await?;
        Ok(())
    }

    async fn remove_member(&self, channel_id: &str, user_id: &str) -> Result<(), ChatError> {
        let url = self.url(&format!("channels/{}/members/{}", channel_id, user_id));
        self.send(&url, self.client.delete(&url)).await?;
        Ok(())
    }

    async fn issue_token(&self, user_id: &str, display_name: &str) -> Result<ChatToken, ChatError> {
        let url = self.url("tokens");
        let body = self
            .send(
                &url,
                self.client.post(&url).json(&serde_json::json!({
                    "user_id": user_id,
                    "name": display_name,
                })),
            )
            .await?;

        let token = body
            .get("token")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ChatError::Decode("token missing from response".to_string()))?;

        Ok(ChatToken {
            token: token.to_string(),
            user: ChatUser {
                id: user_id.to_string(),
                name: display_name.to_string(),
            },
        })
    }

    async fn fetch_channel_state(&self, channel_id: &str) -> Result<Value, ChatError> {
        let url = self.url(&format!("channels/{}", channel_id));
        self.send(&url, self.client.get(&url)).await
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_create_channel_posts_activity_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/channels"))
            .and(header("authorization", "Bearer server-key"))
            .and(body_partial_json(serde_json::json!({
                "channel_id": "activity-a1",
                "members": ["host-1"],
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let chat = HttpChatNotifier::new(server.uri(), Some("server-key".to_string()), None);
        let channel = chat.create_channel("a1", "Sunset run", "host-1").await.unwrap();
        assert_eq!(channel, "activity-a1");
    }

    #[tokio::test]
    async fn test_upstream_error_keeps_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/channels/activity-a1/members"))
            .respond_with(
                ResponseTemplate::new(503).set_body_json(serde_json::json!({ "error": "down" })),
            )
            .mount(&server)
            .await;

        let chat = HttpChatNotifier::new(server.uri(), None, None);
        let err = chat.add_member("activity-a1", "u1", "Ann").await.unwrap_err();
        match err {
            ChatError::Upstream { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.unwrap()["error"], "down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_issue_token_requires_token_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "token": "t0k" })))
            .mount(&server)
            .await;

        let chat = HttpChatNotifier::new(format!("{}/", server.uri()), None, None);
        let token = chat.issue_token("u1", "Ann").await.unwrap();
        assert_eq!(token.token, "t0k");
        assert_eq!(token.user.name, "Ann");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_connect_error() {
        let chat = HttpChatNotifier::new("http://127.0.0.1:1", None, None);
        let err = chat.fetch_channel_state("activity-a1").await.unwrap_err();
        assert!(matches!(err, ChatError::Connect { .. }));
    }

    #[tokio::test]
    async fn test_bounded_times_out() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, ChatError>(())
        };
        let err = bounded(Duration::from_millis(10), slow).await.unwrap_err();
        assert!(matches!(err, ChatError::Timeout(_)));
    }
}
