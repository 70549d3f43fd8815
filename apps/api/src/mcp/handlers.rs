//! Axum route handlers for the MCP loop.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};

use crate::errors::AppError;
use crate::mcp::request::{Mode, RawLoopRequest};
use crate::mcp::response::LoopResponse;
use crate::state::AppState;

/// POST /api/v1/mcp
///
/// Runs the loop. A body that is not valid JSON, or has a field of the wrong
/// type, is answered as a validation failure in the usual envelope.
pub async fn handle_mcp(
    State(state): State<AppState>,
    body: Result<Json<RawLoopRequest>, JsonRejection>,
) -> (StatusCode, Json<LoopResponse>) {
    let raw = match body {
        Ok(Json(raw)) => raw,
        Err(rejection) => {
            let err = AppError::Validation(rejection.body_text());
            return (err.status(), Json(LoopResponse::failure(Mode::General, &err)));
        }
    };

    let (status, response) = state.mcp.handle(raw).await;
    (status, Json(response))
}

/// OPTIONS /api/v1/mcp
///
/// Bare 200 for cross-origin preflight.
pub async fn handle_preflight() -> StatusCode {
    StatusCode::OK
}
