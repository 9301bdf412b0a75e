//! Chat passthrough request and response.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extract::{Validate, ValidationError};

/// Longest accepted chat message, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// User id sent when the client supplies none.
pub const ANONYMOUS_USER: &str = "anonymous";

/// `POST /chat` body.
#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    pub message: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

/// A validated chat turn, as forwarded to the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub message: String,
    pub session_id: String,
    pub user_id: String,
}

impl Validate for ChatRequestBody {
    type Output = ChatTurn;

    fn validate(self) -> Result<ChatTurn, ValidationError> {
        let message = self
            .message
            .ok_or(ValidationError::MissingField("message"))?
            .trim()
            .to_owned();
        if message.is_empty() {
            return Err(ValidationError::Blank("message"));
        }
        let chars = message.chars().count();
        if chars > MAX_MESSAGE_CHARS {
            return Err(ValidationError::TooLong {
                field: "message",
                max: MAX_MESSAGE_CHARS,
                got: chars,
            });
        }

        let session_id = self
            .session_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let user_id = self
            .user_id
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_owned());

        Ok(ChatTurn {
            message,
            session_id,
            user_id,
        })
    }
}

/// Whether a chat reply succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    Success,
    Error,
}

/// Reply from the chat service, relayed to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub status: ChatStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    /// An error reply for `session_id`.
    #[must_use]
    pub fn error(session_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            response: "Service temporarily unavailable".to_owned(),
            session_id: session_id.into(),
            status: ChatStatus::Error,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn body(message: &str) -> ChatRequestBody {
        ChatRequestBody {
            message: Some(message.to_owned()),
            session_id: None,
            user_id: None,
        }
    }

    #[test]
    fn test_message_is_trimmed_and_defaults_filled() {
        let turn = body("  find me a mug  ").validate().unwrap();
        assert_eq!(turn.message, "find me a mug");
        assert_eq!(turn.user_id, ANONYMOUS_USER);
        assert!(Uuid::parse_str(&turn.session_id).is_ok());
    }

    #[test]
    fn test_session_id_is_kept() {
        let turn = ChatRequestBody {
            message: Some("hi".to_owned()),
            session_id: Some("abc-123".to_owned()),
            user_id: Some("u-9".to_owned()),
        }
        .validate()
        .unwrap();
        assert_eq!(turn.session_id, "abc-123");
        assert_eq!(turn.user_id, "u-9");
    }

    #[test]
    fn test_blank_and_oversized_messages_are_rejected() {
        assert!(matches!(
            body("   \n\t").validate(),
            Err(ValidationError::Blank("message"))
        ));
        assert!(matches!(
            body(&"é".repeat(MAX_MESSAGE_CHARS + 1)).validate(),
            Err(ValidationError::TooLong { got: 2001, .. })
        ));
        assert!(body(&"é".repeat(MAX_MESSAGE_CHARS)).validate().is_ok());
    }

    #[test]
    fn test_response_wire_format() {
        let json = serde_json::to_value(ChatResponse::error("s1", "boom")).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");

        let ok: ChatResponse = serde_json::from_str(
            r#"{"response": "Here you go", "session_id": "s1", "status": "success"}"#,
        )
        .unwrap();
        assert_eq!(ok.status, ChatStatus::Success);
        assert!(ok.error.is_none());
    }
}
