//! Encoding JSON payloads into card blocks and back.

use serde_json::Value;

use crate::error::CodecError;
use crate::layout::{Block, BlockLayout, BLOCK_SIZE};

/// Result of decoding the blocks read from a card.
#[derive(Clone, Debug, PartialEq)]
pub enum DecodeOutcome {
    /// A parsed JSON value.
    Payload(Value),
    /// Nothing written yet: all zero bytes or whitespace.
    Empty,
    /// Data present but not JSON (corrupt or foreign).
    Malformed(String),
}

impl DecodeOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

/// Length of the compact serialization of `payload`.
pub fn encoded_len(payload: &Value) -> Result<usize, CodecError> {
    serde_json::to_vec(payload)
        .map(|bytes| bytes.len())
        .map_err(|e| CodecError::Serialization(e.to_string()))
}

/// Serialize `payload` into `(block_index, block)` pairs.
///
/// The last block is zero-padded. Fails with [`CodecError::PayloadTooLarge`]
/// when the payload needs more than `layout.block_budget` blocks or more
/// blocks than the card has left after `start_block`.
pub fn encode(payload: &Value, layout: &BlockLayout) -> Result<Vec<(u8, Block)>, CodecError> {
    let bytes = serde_json::to_vec(payload).map_err(|e| CodecError::Serialization(e.to_string()))?;
    let too_large = || CodecError::PayloadTooLarge {
        size: bytes.len(),
        capacity: layout.capacity(),
    };

    let block_count = bytes.len().div_ceil(BLOCK_SIZE);
    if block_count > layout.block_budget {
        return Err(too_large());
    }
    let indices = layout.data_blocks(block_count).ok_or_else(too_large)?;

    Ok(indices
        .into_iter()
        .zip(bytes.chunks(BLOCK_SIZE))
        .map(|(index, chunk)| {
            let mut block = [0u8; BLOCK_SIZE];
            block[..chunk.len()].copy_from_slice(chunk);
            (index, block)
        })
        .collect())
}

/// Reconstruct a payload from blocks in read order.
pub fn decode(blocks: &[Block]) -> DecodeOutcome {
    let mut bytes: Vec<u8> = blocks.iter().flatten().copied().collect();
    while bytes.last() == Some(&0) {
        bytes.pop();
    }

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return DecodeOutcome::Empty;
    }

    match serde_json::from_slice(&bytes) {
        Ok(value) => DecodeOutcome::Payload(value),
        Err(e) => DecodeOutcome::Malformed(e.to_string()),
    }
}
