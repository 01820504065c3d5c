//! Kiosk backend node.
//!
//! The node is the central coordinator that:
//! - Loads configuration and initialises logging
//! - Opens the card reader, falling back to a degraded mode without one
//! - Runs the scan loop and fans verdicts out to WebSocket clients
//! - Serves the HTTP API until a shutdown signal arrives

pub mod config;
pub mod error;
pub mod logging;
pub mod node;
pub mod shutdown;

pub use config::KioskConfig;
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use node::KioskNode;
pub use shutdown::ShutdownController;
