// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::auth::JwtError;
use crate::integrations::IntegrationError;
use crate::marketplace::MarketplaceError;
use crate::notifications::NotificationError;
use crate::payments::PixError;
use crate::registry::RegistryError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: Option<HashMap<String, String>>,
    },
    InvalidJson(String),

    // 401 Unauthorized
    Unauthorized(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 422 Unprocessable Entity
    UnprocessableEntity(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::InvalidJson(_) => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::UnprocessableEntity(_) => 422,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::InvalidJson(msg) => msg,
            ApiError::Unauthorized(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::UnprocessableEntity(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Convert to JSON response body
    pub fn to_json(&self) -> Value {
        let mut response = json!({
            "success": false,
            "error": self.message(),
            "code": self.error_code()
        });

        if let ApiError::ValidationError {
            field_errors: Some(field_errors),
            ..
        } = self
        {
            response["field_errors"] = json!(field_errors);
        }

        response
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::ValidationError { .. } => "VALIDATION_ERROR",
            ApiError::InvalidJson(_) => "INVALID_JSON",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::UnprocessableEntity(_) => "UNPROCESSABLE_ENTITY",
            ApiError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ApiError::BadGateway(_) => "BAD_GATEWAY",
            ApiError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(message: impl Into<String>, field_errors: Option<HashMap<String, String>>) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    /// Validation error pointing at a single field
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        let mut field_errors = HashMap::new();
        field_errors.insert(field.into(), message.clone());
        ApiError::validation_error(message, Some(field_errors))
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        ApiError::InvalidJson(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn unprocessable_entity(message: impl Into<String>) -> Self {
        ApiError::UnprocessableEntity(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

// Convert module error types to ApiError
impl From<PixError> for ApiError {
    fn from(err: PixError) -> Self {
        match &err {
            PixError::FieldTooLong { tag, .. } => ApiError::field_error(tag.clone(), err.to_string()),
            PixError::NonAscii { field } | PixError::MissingField(field) => {
                ApiError::field_error(*field, err.to_string())
            }
            PixError::InvalidAmount(_) => ApiError::field_error("amount", err.to_string()),
            PixError::Malformed(_) | PixError::CrcMismatch { .. } => ApiError::unprocessable_entity(err.to_string()),
        }
    }
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::TemplateNotFound(_) => ApiError::not_found(err.to_string()),
            NotificationError::MissingVariable { .. } | NotificationError::UnknownChannel(_) => {
                ApiError::bad_request(err.to_string())
            }
            NotificationError::ChannelNotConfigured(_) => ApiError::unprocessable_entity(err.to_string()),
            NotificationError::Delivery { .. } => {
                tracing::error!("Notification delivery failed: {}", err);
                ApiError::bad_gateway(err.to_string())
            }
            NotificationError::QueueFull | NotificationError::QueueClosed => {
                ApiError::service_unavailable(err.to_string())
            }
        }
    }
}

impl From<IntegrationError> for ApiError {
    fn from(err: IntegrationError) -> Self {
        match err {
            IntegrationError::UnknownSource(_) => ApiError::not_found(err.to_string()),
            IntegrationError::MissingSignature(_)
            | IntegrationError::MalformedSignature(_)
            | IntegrationError::InvalidSignature
            | IntegrationError::StaleTimestamp { .. } => ApiError::unauthorized(err.to_string()),
            IntegrationError::InvalidPayload(msg) => ApiError::invalid_json(msg),
            IntegrationError::Handler(_) => ApiError::bad_gateway(err.to_string()),
            IntegrationError::DuplicateSource(_)
            | IntegrationError::UnknownScheme(_)
            | IntegrationError::Configuration(_) => {
                tracing::error!("Integration configuration error: {}", err);
                ApiError::internal_server_error("Webhook integration is misconfigured")
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownModule(_) => ApiError::not_found(err.to_string()),
            RegistryError::AlreadyRegistered(_) => ApiError::conflict(err.to_string()),
            RegistryError::Initialization { .. } => {
                tracing::error!("{}", err);
                ApiError::service_unavailable(err.to_string())
            }
        }
    }
}

impl From<MarketplaceError> for ApiError {
    fn from(err: MarketplaceError) -> Self {
        match err {
            MarketplaceError::ModuleNotFound { .. } | MarketplaceError::NotInstalled(_) | MarketplaceError::NoBackup(_) => {
                ApiError::not_found(err.to_string())
            }
            MarketplaceError::AlreadyInstalled { .. }
            | MarketplaceError::InUse { .. }
            | MarketplaceError::VersionConflict { .. }
            | MarketplaceError::CircularDependency(_)
            | MarketplaceError::MissingDependency { .. } => ApiError::conflict(err.to_string()),
            MarketplaceError::InvalidManifest { .. } => ApiError::unprocessable_entity(err.to_string()),
            MarketplaceError::Io { .. } | MarketplaceError::Config(_) => {
                // Paths stay in the log
                tracing::error!("Marketplace error: {}", err);
                ApiError::internal_server_error("Marketplace storage error")
            }
        }
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::InvalidToken(_) => ApiError::unauthorized(err.to_string()),
            JwtError::InvalidSecret | JwtError::TokenGeneration(_) => {
                tracing::error!("JWT error: {}", err);
                ApiError::internal_server_error("Authentication is not configured")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
