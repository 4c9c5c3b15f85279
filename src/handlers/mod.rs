pub mod auth;
pub mod modules;
pub mod notifications;
pub mod payments;
pub mod public;
pub mod webhooks;
