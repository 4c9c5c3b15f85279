use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Nexus API",
            "version": version,
            "description": "Modular backend: PIX payments, notifications, webhooks and a module marketplace",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "pix_decode": "/api/payments/pix/decode (public)",
                "webhooks": "/api/webhooks/:source (public, signed)",
                "payments": "/api/payments/pix (protected)",
                "notifications": "/api/notifications (protected)",
                "modules": "/api/modules[/:name] (protected)",
                "auth": "/api/auth/whoami (protected)",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let now = Utc::now();

    Json(json!({
        "success": true,
        "data": {
            "status": "ok",
            "timestamp": now,
            "uptime_secs": (now - state.started_at).num_seconds(),
            "environment": state.config.environment,
            "queue": state.queue.stats(),
        }
    }))
}
