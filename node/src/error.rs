use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("config error: {0}")]
    Config(String),

    #[error("registry error: {0}")]
    Registry(#[from] kiosk_registry::RegistryError),

    #[error("scanner error: {0}")]
    Scanner(#[from] kiosk_scanner::ScannerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    Server(String),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
