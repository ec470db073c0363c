//! HTTP route handlers for the sonia API.

pub mod auth;
pub mod chat;
pub mod context;
pub mod insights;
pub mod journal;
pub mod voice;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "OK"
}
