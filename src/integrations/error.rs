use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("Unknown webhook source: {0}")]
    UnknownSource(String),

    #[error("Webhook source already registered: {0}")]
    DuplicateSource(String),

    #[error("Unknown signature scheme: {0}")]
    UnknownScheme(String),

    #[error("Missing signature header: {0}")]
    MissingSignature(&'static str),

    #[error("Malformed signature: {0}")]
    MalformedSignature(String),

    #[error("Signature does not match payload")]
    InvalidSignature,

    #[error("Request timestamp {timestamp} is outside the allowed window (now {now})")]
    StaleTimestamp { timestamp: i64, now: i64 },

    #[error("Invalid webhook payload: {0}")]
    InvalidPayload(String),

    #[error("Integration misconfigured: {0}")]
    Configuration(String),

    #[error("Webhook handler failed: {0}")]
    Handler(String),
}
