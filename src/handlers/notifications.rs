use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::notifications::Notification;

#[derive(Debug, Deserialize)]
pub struct NotificationRequest {
    #[serde(flatten)]
    pub notification: Notification,
    /// Hand off to the background queue instead of sending inline
    #[serde(default)]
    pub queue: bool,
}

/// POST /api/notifications - Send a notification now, or queue it
///
/// Inline sends answer with one outcome per channel. Queued sends answer
/// 202 as soon as the notification is accepted, or 503 when the queue is full.
pub async fn send(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<NotificationRequest>,
) -> ApiResult<Value> {
    let notification = request.notification;
    if notification.channels.is_empty() {
        return Err(ApiError::field_error("channels", "At least one channel is required"));
    }

    if request.queue {
        // Render now so bad templates fail the request rather than the worker
        state.notifier.render(&notification.content)?;
        state.queue.try_enqueue(notification)?;
        tracing::debug!(user = %user.id, "Notification queued");
        return Ok(ApiResponse::accepted(json!({
            "queued": true,
            "stats": state.queue.stats(),
        })));
    }

    let outcomes = state.notifier.dispatch(&notification).await?;
    let delivered = outcomes.iter().filter(|o| o.success).count();
    tracing::info!(
        user = %user.id,
        delivered,
        requested = outcomes.len(),
        "Notification dispatched"
    );

    Ok(ApiResponse::success(json!({
        "delivered": delivered,
        "outcomes": outcomes,
    })))
}
