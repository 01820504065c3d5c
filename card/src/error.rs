use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardError {
    #[error("authentication failed for block {block}")]
    AuthenticationFailed { block: u8 },

    #[error("card rejected write to block {block}")]
    WriteRejected { block: u8 },

    #[error("no card present")]
    NoCard,

    #[error("card has fewer than {count} usable blocks from block {start}")]
    OutOfBlocks { start: u8, count: usize },

    #[error("read-back after write did not match: {0}")]
    ReadBackMismatch(String),

    #[error("card reader disconnected: {0}")]
    Disconnected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("codec error: {0}")]
    Codec(#[from] kiosk_codec::CodecError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CardError {
    /// Whether the reader itself is gone and polling cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}
