//! Client for the external chat service.
//!
//! Chat turns are validated here and forwarded unchanged; the chat service
//! owns the conversation and calls back into this API through the tool
//! endpoints. Network failures and 5xx responses are retried with exponential
//! backoff; 4xx responses are returned immediately.
//!
//! The caller's request id is forwarded as `x-request-id`, so the tool calls
//! the chat service makes for this turn can be correlated with it.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{instrument, warn};
use url::Url;

use crate::config::ChatConfig;
use crate::middleware::REQUEST_ID_HEADER;
use crate::models::{ChatResponse, ChatStatus, ChatTurn};

/// Delay before the first retry; doubles on each further attempt.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Errors that can occur when talking to the chat service.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The chat service answered with an error status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The chat service replied with `status: "error"`.
    #[error("chat service error: {0}")]
    Reply(String),

    /// Failed to build the client or parse a response.
    #[error("parse error: {0}")]
    Parse(String),
}

impl ChatError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status >= 500,
            Self::Reply(_) | Self::Parse(_) => false,
        }
    }
}

/// HTTP client for the chat service.
#[derive(Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    endpoint: Url,
    max_retries: u32,
    initial_backoff: Duration,
}

impl ChatClient {
    /// Create a chat client.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                .map_err(|e| ChatError::Parse(format!("Invalid API key format: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        let endpoint = Url::parse(&format!(
            "{}/chat",
            config.base_url.as_str().trim_end_matches('/')
        ))
        .map_err(|e| ChatError::Parse(format!("Invalid chat service URL: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            max_retries: config.max_retries.max(1),
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override the delay before the first retry.
    #[must_use]
    pub const fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// The URL chat turns are posted to.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Forward a chat turn and return the reply.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Reply` if the chat service reports an error, or
    /// the last transport error once retries are exhausted.
    #[instrument(skip(self, turn), fields(session_id = %turn.session_id))]
    pub async fn send(&self, turn: &ChatTurn, request_id: &str) -> Result<ChatResponse, ChatError> {
        let mut attempt = 0;
        loop {
            match self.send_once(turn, request_id).await {
                Err(err) if err.is_retryable() && attempt + 1 < self.max_retries => {
                    let delay = self
                        .initial_backoff
                        .saturating_mul(2_u32.saturating_pow(attempt));
                    warn!(
                        attempt = attempt + 1,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Chat service request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send_once(
        &self,
        turn: &ChatTurn,
        request_id: &str,
    ) -> Result<ChatResponse, ChatError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(REQUEST_ID_HEADER, request_id)
            .json(turn)
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let reply: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::Parse(e.to_string()))?;

        if reply.status == ChatStatus::Error {
            return Err(ChatError::Reply(
                reply.error.unwrap_or_else(|| "unknown error".to_owned()),
            ));
        }
        Ok(reply)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::{Json, Router, extract::State, http::StatusCode, routing::post};
    use secrecy::SecretString;

    use super::*;

    fn turn() -> ChatTurn {
        ChatTurn {
            message: "hello".to_owned(),
            session_id: "s1".to_owned(),
            user_id: "anonymous".to_owned(),
        }
    }

    /// Serve `router` on an ephemeral port and return a client pointed at it.
    async fn client_for(router: Router, max_retries: u32) -> ChatClient {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await });

        let config = ChatConfig {
            base_url: Url::parse(&format!("http://{addr}/")).unwrap(),
            api_key: Some(SecretString::from("test-key")),
            timeout: Duration::from_secs(5),
            max_retries,
        };
        ChatClient::new(&config)
            .unwrap()
            .with_initial_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_send_forwards_turn_with_auth_and_request_id() {
        let router = Router::new().route(
            "/chat",
            post(|headers: axum::http::HeaderMap, Json(turn): Json<ChatTurn>| async move {
                let header = |name: &str| {
                    headers
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_owned()
                };
                Json(ChatResponse {
                    response: format!(
                        "{} / {} / {}",
                        header("authorization"),
                        header(REQUEST_ID_HEADER),
                        turn.message
                    ),
                    session_id: turn.session_id,
                    status: ChatStatus::Success,
                    error: None,
                })
            }),
        );
        let client = client_for(router, 3).await;

        let reply = client.send(&turn(), "req-1").await.unwrap();
        assert_eq!(reply.response, "Bearer test-key / req-1 / hello");
        assert_eq!(reply.session_id, "s1");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/chat",
                post(|State(calls): State<Arc<AtomicU32>>| async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(StatusCode::BAD_GATEWAY)
                    } else {
                        Ok(Json(ChatResponse {
                            response: "finally".to_owned(),
                            session_id: "s1".to_owned(),
                            status: ChatStatus::Success,
                            error: None,
                        }))
                    }
                }),
            )
            .with_state(Arc::clone(&calls));
        let client = client_for(router, 3).await;

        let reply = client.send(&turn(), "req-1").await.unwrap();
        assert_eq!(reply.response, "finally");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let router = Router::new()
            .route(
                "/chat",
                post(|State(calls): State<Arc<AtomicU32>>| async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    StatusCode::UNPROCESSABLE_ENTITY
                }),
            )
            .with_state(Arc::clone(&calls));
        let client = client_for(router, 3).await;

        let err = client.send(&turn(), "req-1").await.unwrap_err();
        assert!(matches!(err, ChatError::Api { status: 422, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_reply_is_an_error() {
        let router = Router::new().route(
            "/chat",
            post(|| async {
                Json(ChatResponse {
                    response: String::new(),
                    session_id: "s1".to_owned(),
                    status: ChatStatus::Error,
                    error: Some("model overloaded".to_owned()),
                })
            }),
        );
        let client = client_for(router, 3).await;

        let err = client.send(&turn(), "req-1").await.unwrap_err();
        assert!(matches!(err, ChatError::Reply(msg) if msg == "model overloaded"));
    }

    #[test]
    fn test_endpoint_appends_chat_path() {
        for (base, expected) in [
            ("http://chat.internal:8000/", "http://chat.internal:8000/chat"),
            ("http://chat.internal:8000/v1", "http://chat.internal:8000/v1/chat"),
        ] {
            let config = ChatConfig {
                base_url: Url::parse(base).unwrap(),
                api_key: None,
                timeout: Duration::from_secs(5),
                max_retries: 3,
            };
            let client = ChatClient::new(&config).unwrap();
            assert_eq!(client.endpoint().as_str(), expected);
        }
    }
}
