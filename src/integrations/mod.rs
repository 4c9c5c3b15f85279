// Integrations: signed inbound webhooks routed to handlers

pub mod error;
pub mod router;
pub mod signature;

pub use error::IntegrationError;
pub use router::{LogHandler, NotifyHandler, WebhookEvent, WebhookHandler, WebhookRouter};
pub use signature::{sign, verify_hex, SignatureScheme};
