//! RPC request handlers.

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use kiosk_scanner::WaitOutcome;
use kiosk_types::Verdict;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RpcError;
use crate::server::RpcState;

// ── Health ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Connected,
    Disconnected,
}

impl From<bool> for ServiceState {
    fn from(up: bool) -> Self {
        if up {
            Self::Connected
        } else {
            Self::Disconnected
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Services {
    pub card_reader: ServiceState,
    pub registry: ServiceState,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub services: Services,
    pub websocket_clients: usize,
    pub scanner_running: bool,
}

pub async fn health(State(state): State<RpcState>) -> Json<HealthResponse> {
    let reader_up = state
        .scanner
        .as_ref()
        .is_some_and(|scanner| scanner.reader_connected());
    let registry_up = state.registry.is_reachable().await;

    Json(HealthResponse {
        status: if reader_up && registry_up {
            HealthStatus::Ok
        } else {
            HealthStatus::Degraded
        },
        timestamp: Utc::now(),
        services: Services {
            card_reader: reader_up.into(),
            registry: registry_up.into(),
        },
        websocket_clients: state.broadcaster.subscriber_count(),
        scanner_running: state.scanner.as_ref().is_some_and(|s| s.is_running()),
    })
}

// ── Verification ─────────────────────────────────────────────────────────

/// Wait for a card and return its verdict directly to the caller.
pub async fn verify(State(state): State<RpcState>) -> Result<Json<Verdict>, RpcError> {
    let scanner = state.scanner.as_ref().ok_or(RpcError::ReaderUnavailable)?;
    info!(timeout = ?state.verify_timeout, "manual verification requested");

    match scanner.wait_for_card(state.verify_timeout).await {
        Ok(WaitOutcome::Verdict(verdict)) => Ok(Json(verdict)),
        Ok(WaitOutcome::NoCardDetected) => Err(RpcError::NoCardDetected),
        Err(e) => {
            warn!("manual verification failed: {e}");
            Err(e.into())
        }
    }
}
