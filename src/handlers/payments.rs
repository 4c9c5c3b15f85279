use axum::{extract::State, Extension, Json};
use serde::Deserialize;

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::payments::{self, ChargeRequest, PixCharge, PixPayload};

/// POST /api/payments/pix - Create a static PIX charge for the configured merchant
pub async fn create_charge(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ChargeRequest>,
) -> ApiResult<PixCharge> {
    let charge = state.payments.create_charge(request)?;

    tracing::info!(
        user = %user.id,
        transaction_id = %charge.transaction_id,
        amount = ?charge.amount,
        "PIX charge created"
    );

    Ok(ApiResponse::created(charge))
}

#[derive(Debug, Deserialize)]
pub struct DecodeRequest {
    pub code: String,
}

/// POST /api/payments/pix/decode - Verify a BR Code and return its fields
pub async fn decode(Json(request): Json<DecodeRequest>) -> ApiResult<PixPayload> {
    let payload = payments::decode(request.code.trim())?;
    Ok(ApiResponse::success(payload))
}
