//! Card scanning: debounce and orchestration.
//!
//! [`Scanner`] owns the card transport and runs two modes over the same
//! scan step:
//! - a continuous loop that polls the reader, gates detections through the
//!   [`Debouncer`], verifies accepted cards and broadcasts the verdicts;
//! - a single-shot [`Scanner::wait_for_card`] for operator-triggered
//!   requests, which ignores debounce history.
//!
//! The transport sits behind an async mutex that acts as the session token:
//! only one scan attempt talks to the reader at a time, and every blocking
//! transport call runs on a blocking thread while the token is held.

pub mod config;
pub mod debounce;
pub mod error;
pub mod scanner;

pub use config::ScannerConfig;
pub use debounce::{DebounceState, Debouncer};
pub use error::ScannerError;
pub use scanner::{Scanner, WaitOutcome};
