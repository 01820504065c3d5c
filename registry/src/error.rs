use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry unreachable: {0}")]
    Unreachable(String),

    #[error("registry request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response from registry: {0}")]
    InvalidResponse(String),

    #[error("unknown registry network: {0}")]
    UnknownNetwork(String),

    #[error("registry client error: {0}")]
    Client(String),
}
