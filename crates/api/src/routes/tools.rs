//! Tool endpoints called back by the chat service.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde_json::Value;
use tracing::instrument;

use crate::error::Result;
use crate::state::AppState;
use crate::tools::{ToolDefinition, ToolError, ToolExecutor, all_tools, get_tool_by_name};

/// List every tool with its input schema.
pub async fn index() -> Json<Vec<ToolDefinition>> {
    Json(all_tools())
}

/// Run a tool.
///
/// An empty body is treated as no input. Unknown tools are rejected before
/// the body is parsed.
#[instrument(skip(state, body))]
pub async fn execute(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<Value>> {
    if get_tool_by_name(&name).is_none() {
        return Err(ToolError::UnknownTool(name).into());
    }

    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ToolError::InvalidInput(format!("body is not valid JSON: {e}")))?
    };

    let result = ToolExecutor::new(state.catalog(), state.cart())
        .execute(&name, &input)
        .await?;
    Ok(Json(result))
}
