pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod integrations;
pub mod marketplace;
pub mod middleware;
pub mod notifications;
pub mod payments;
pub mod registry;

#[cfg(test)]
pub mod testing;
