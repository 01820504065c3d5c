//! RPC error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use kiosk_scanner::ScannerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no card detected within timeout")]
    NoCardDetected,

    #[error("card reader not initialized")]
    ReaderUnavailable,

    #[error("scanner error: {0}")]
    Scanner(#[from] ScannerError),
}

impl RpcError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoCardDetected => StatusCode::REQUEST_TIMEOUT,
            Self::ReaderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Scanner(e) if e.is_fatal() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Scanner(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::NoCardDetected => "no_card_detected",
            Self::ReaderUnavailable => "reader_unavailable",
            Self::Scanner(_) => "scanner_error",
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = json!({ "error_kind": self.kind(), "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
