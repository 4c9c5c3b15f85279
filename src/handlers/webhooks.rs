use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::Value;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};

/// POST /api/webhooks/:source - Verify a signed delivery and hand it to the source's handler
///
/// The body is taken as raw bytes; signatures cover the exact bytes sent.
pub async fn receive(
    State(state): State<AppState>,
    Path(source): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Value> {
    let result = state.webhooks.dispatch(&source, &headers, &body).await?;
    Ok(ApiResponse::success(result))
}
