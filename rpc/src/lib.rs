//! HTTP API for the kiosk.
//!
//! Provides endpoints for:
//! - Service health (card reader, registry, subscriber count)
//! - Operator-triggered single-shot verification

pub mod error;
pub mod handlers;
pub mod server;

pub use error::RpcError;
pub use handlers::{HealthResponse, HealthStatus, ServiceState, Services};
pub use server::{router, RpcState};
