//! Nullable card reader — an in-memory card slot controlled from the test.

use kiosk_card::{CardError, CardTransport, KeyType, DEFAULT_KEY};
use kiosk_codec::{encode, Block, BlockLayout, BLOCK_SIZE};
use kiosk_types::CardId;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// A card that can be placed on a [`NullTransport`].
#[derive(Clone, Debug)]
pub struct NullCard {
    pub id: CardId,
    blocks: HashMap<u8, Block>,
    key: [u8; 6],
    reject_auth_at: Option<u8>,
}

impl NullCard {
    /// A factory-fresh card with all data blocks zeroed.
    pub fn blank(uid: &[u8]) -> Self {
        Self {
            id: CardId::new(uid),
            blocks: HashMap::new(),
            key: DEFAULT_KEY,
            reject_auth_at: None,
        }
    }

    /// A card holding `payload` encoded with the default layout.
    pub fn with_payload(uid: &[u8], payload: &Value) -> Self {
        let mut card = Self::blank(uid);
        let encoded = encode(payload, &BlockLayout::default())
            .expect("test payload fits the default layout");
        card.blocks.extend(encoded);
        card
    }

    /// A card holding arbitrary bytes from the default start block onward.
    pub fn with_raw(uid: &[u8], bytes: &[u8]) -> Self {
        let mut card = Self::blank(uid);
        let layout = BlockLayout::default();
        for (index, chunk) in layout.usable_blocks().zip(bytes.chunks(BLOCK_SIZE)) {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            card.blocks.insert(index, block);
        }
        card
    }

    /// Sector key that authentication must present.
    pub fn with_key(mut self, key: [u8; 6]) -> Self {
        self.key = key;
        self
    }

    /// Reject authentication of one block regardless of key.
    pub fn reject_auth_at(mut self, block: u8) -> Self {
        self.reject_auth_at = Some(block);
        self
    }

    pub fn block(&self, index: u8) -> Block {
        self.blocks.get(&index).copied().unwrap_or([0u8; BLOCK_SIZE])
    }
}

#[derive(Debug, Default)]
struct ReaderState {
    card: Option<NullCard>,
    disconnected: bool,
    detect_delay: Duration,
    detect_calls: usize,
    reads: Vec<u8>,
    writes: Vec<u8>,
}

/// Test-side handle to the reader: place and remove cards, inspect calls.
#[derive(Clone, Default)]
pub struct NullReader {
    state: Arc<Mutex<ReaderState>>,
}

impl NullReader {
    pub fn place(&self, card: NullCard) {
        self.state.lock().unwrap().card = Some(card);
    }

    pub fn remove(&self) -> Option<NullCard> {
        self.state.lock().unwrap().card.take()
    }

    /// The card currently in the field, including any writes made to it.
    pub fn card(&self) -> Option<NullCard> {
        self.state.lock().unwrap().card.clone()
    }

    /// Make every subsequent transport call fail as if the reader was unplugged.
    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    /// How long `detect` blocks when no card is present (capped by its timeout).
    pub fn set_detect_delay(&self, delay: Duration) {
        self.state.lock().unwrap().detect_delay = delay;
    }

    pub fn detect_calls(&self) -> usize {
        self.state.lock().unwrap().detect_calls
    }

    /// Block indices read so far, in order.
    pub fn reads(&self) -> Vec<u8> {
        self.state.lock().unwrap().reads.clone()
    }

    /// Block indices written so far, in order.
    pub fn writes(&self) -> Vec<u8> {
        self.state.lock().unwrap().writes.clone()
    }
}

/// A card transport backed by a [`NullReader`].
pub struct NullTransport {
    reader: NullReader,
    authenticated: Option<u8>,
}

impl NullTransport {
    pub fn new() -> Self {
        Self {
            reader: NullReader::default(),
            authenticated: None,
        }
    }

    /// Handle for controlling this transport from the test.
    pub fn reader(&self) -> NullReader {
        self.reader.clone()
    }

    fn check_auth(&self, block: u8) -> Result<(), CardError> {
        if self.authenticated == Some(block) {
            Ok(())
        } else {
            Err(CardError::Transport(format!("block {block} not authenticated")))
        }
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl CardTransport for NullTransport {
    fn detect(&mut self, timeout: Duration) -> Result<Option<CardId>, CardError> {
        self.authenticated = None;
        let (card, delay) = {
            let mut state = self.reader.state.lock().unwrap();
            if state.disconnected {
                return Err(CardError::Disconnected("null reader unplugged".into()));
            }
            state.detect_calls += 1;
            (state.card.as_ref().map(|c| c.id.clone()), state.detect_delay)
        };
        if card.is_none() && !delay.is_zero() {
            std::thread::sleep(delay.min(timeout));
        }
        Ok(card)
    }

    fn authenticate_block(
        &mut self,
        card: &CardId,
        block: u8,
        _key_type: KeyType,
        key: &[u8; 6],
    ) -> Result<bool, CardError> {
        self.authenticated = None;
        let state = self.reader.state.lock().unwrap();
        if state.disconnected {
            return Err(CardError::Disconnected("null reader unplugged".into()));
        }
        let Some(present) = state.card.as_ref() else {
            return Err(CardError::NoCard);
        };
        if &present.id != card || &present.key != key || present.reject_auth_at == Some(block) {
            return Ok(false);
        }
        drop(state);
        self.authenticated = Some(block);
        Ok(true)
    }

    fn read_block(&mut self, block: u8) -> Result<Block, CardError> {
        self.check_auth(block)?;
        let mut state = self.reader.state.lock().unwrap();
        let data = state.card.as_ref().ok_or(CardError::NoCard)?.block(block);
        state.reads.push(block);
        Ok(data)
    }

    fn write_block(&mut self, block: u8, data: &Block) -> Result<bool, CardError> {
        self.check_auth(block)?;
        let mut state = self.reader.state.lock().unwrap();
        state
            .card
            .as_mut()
            .ok_or(CardError::NoCard)?
            .blocks
            .insert(block, *data);
        state.writes.push(block);
        Ok(true)
    }

    fn name(&self) -> &str {
        "null reader"
    }
}
