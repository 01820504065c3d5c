//! Messages sent to live subscribers.

use chrono::{DateTime, Utc};
use kiosk_types::Verdict;
use serde::Serialize;

/// An event pushed to WebSocket clients, tagged by `event`.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScanEvent {
    /// Sent once when a client connects.
    Connected {
        timestamp: DateTime<Utc>,
        message: String,
    },
    /// One verification verdict.
    Scan(Verdict),
}

impl ScanEvent {
    pub fn connected() -> Self {
        Self::Connected {
            timestamp: Utc::now(),
            message: "Connected to card scan events".to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        // Only string keys and plain values, so this never fails in practice.
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!("{{\"event\":\"error\",\"message\":\"{e}\"}}")
        })
    }
}
