//! Chat passthrough.
//!
//! Validated turns are forwarded to the chat service. Every failure on the
//! far side is reported as 503 with a `ChatResponse` whose status is
//! `"error"`, so the UI can render it like any other reply.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, instrument, warn};

use crate::extract::ValidatedJson;
use crate::middleware::RequestId;
use crate::models::{ChatRequestBody, ChatResponse};
use crate::redact::redact;
use crate::services::ChatError;
use crate::state::AppState;

/// Forward a chat message and relay the reply.
#[instrument(skip_all)]
pub async fn send(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    ValidatedJson(turn): ValidatedJson<ChatRequestBody>,
) -> Response {
    info!(
        session_id = %turn.session_id,
        user_id = %turn.user_id,
        message = %redact(&turn.message),
        "Chat message received"
    );

    let Some(client) = state.chat() else {
        warn!("Chat service is not configured");
        return unavailable(ChatResponse::error(
            turn.session_id,
            "Chat service is not configured",
        ));
    };

    match client.send(&turn, &request_id).await {
        Ok(reply) => {
            info!(response_chars = reply.response.chars().count(), "Chat reply relayed");
            Json(reply).into_response()
        }
        Err(ChatError::Reply(message)) => {
            warn!(error = %message, "Chat service reported an error");
            unavailable(ChatResponse::error(turn.session_id, message))
        }
        Err(e) => {
            error!(error = %e, "Chat service request failed");
            unavailable(ChatResponse::error(
                turn.session_id,
                "Chat service unavailable",
            ))
        }
    }
}

fn unavailable(body: ChatResponse) -> Response {
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}
