//! The card transport contract.

use std::time::Duration;

use kiosk_codec::Block;
use kiosk_types::CardId;

use crate::CardError;

/// Factory default MIFARE Classic key.
pub const DEFAULT_KEY: [u8; 6] = [0xff; 6];

/// Which sector key to authenticate with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyType {
    A,
    #[default]
    B,
}

/// A single-slot contactless card reader.
///
/// Block operations require a successful [`authenticate_block`] of that
/// exact block first. Implementations are not reentrant; callers hold
/// exclusive access for the duration of a scan attempt.
///
/// [`authenticate_block`]: CardTransport::authenticate_block
pub trait CardTransport: Send {
    /// Wait up to `timeout` for a card to enter the field.
    fn detect(&mut self, timeout: Duration) -> Result<Option<CardId>, CardError>;

    /// Authenticate one block with a sector key. `Ok(false)` means the card
    /// rejected the key.
    fn authenticate_block(
        &mut self,
        card: &CardId,
        block: u8,
        key_type: KeyType,
        key: &[u8; 6],
    ) -> Result<bool, CardError>;

    /// Read one previously authenticated block.
    fn read_block(&mut self, block: u8) -> Result<Block, CardError>;

    /// Write one previously authenticated block. `Ok(false)` means the card
    /// rejected the write.
    fn write_block(&mut self, block: u8, data: &Block) -> Result<bool, CardError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

impl<T: CardTransport + ?Sized> CardTransport for Box<T> {
    fn detect(&mut self, timeout: Duration) -> Result<Option<CardId>, CardError> {
        (**self).detect(timeout)
    }

    fn authenticate_block(
        &mut self,
        card: &CardId,
        block: u8,
        key_type: KeyType,
        key: &[u8; 6],
    ) -> Result<bool, CardError> {
        (**self).authenticate_block(card, block, key_type, key)
    }

    fn read_block(&mut self, block: u8) -> Result<Block, CardError> {
        (**self).read_block(block)
    }

    fn write_block(&mut self, block: u8, data: &Block) -> Result<bool, CardError> {
        (**self).write_block(block, data)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
