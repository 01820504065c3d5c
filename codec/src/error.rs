use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("payload too large: {size} bytes > {capacity} bytes of card capacity")]
    PayloadTooLarge { size: usize, capacity: usize },

    #[error("serialization error: {0}")]
    Serialization(String),
}
