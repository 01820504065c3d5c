use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("card error: {0}")]
    Card(#[from] kiosk_card::CardError),

    #[error("scanner is already running")]
    AlreadyRunning,

    #[error("scan loop did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    #[error("scan task failed: {0}")]
    Task(String),
}

impl ScannerError {
    /// Whether the scan loop cannot continue.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Card(e) => e.is_fatal(),
            Self::Task(_) => true,
            Self::AlreadyRunning | Self::ShutdownTimeout(_) => false,
        }
    }
}
