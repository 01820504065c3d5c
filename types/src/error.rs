//! Errors raised while interpreting decoded card payloads.

use thiserror::Error;

/// Why a decoded JSON payload is not a usable credential pointer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PointerError {
    #[error("card payload is not a JSON object")]
    NotAnObject,

    #[error("card payload is missing field `{0}`")]
    MissingField(&'static str),

    #[error("card payload field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("card payload field `{0}` has an unsupported type")]
    InvalidField(&'static str),
}
