use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult};
use crate::registry::ModuleInfo;

/// GET /api/modules - Registered modules; only loaded ones are described
pub async fn list(State(state): State<AppState>) -> ApiResult<Vec<ModuleInfo>> {
    Ok(ApiResponse::success(state.registry.list()))
}

/// GET /api/modules/:name - Load a module if needed and describe it
pub async fn show(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Value> {
    let module = state.registry.get(&name)?;
    Ok(ApiResponse::success(json!({
        "name": module.name(),
        "version": module.version(),
        "details": module.describe(),
    })))
}
