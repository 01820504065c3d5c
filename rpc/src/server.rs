//! Axum router for the HTTP API.

use axum::routing::{get, post};
use axum::Router;
use kiosk_registry::RegistryLookup;
use kiosk_scanner::Scanner;
use kiosk_websocket::Broadcaster;
use std::sync::Arc;
use std::time::Duration;

use crate::handlers;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct RpcState {
    /// Absent when the card reader failed to open at startup.
    pub scanner: Option<Arc<Scanner>>,
    pub registry: Arc<dyn RegistryLookup>,
    pub broadcaster: Arc<Broadcaster>,
    /// How long `POST /api/verify` waits for a card.
    pub verify_timeout: Duration,
}

/// Router serving `/api/health` and `/api/verify`.
pub fn router(state: RpcState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/verify", post(handlers::verify))
        .with_state(state)
}
