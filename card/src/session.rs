//! Block-level read/write sessions against a detected card.
//!
//! Every block is authenticated immediately before it is read or written.
//! An authentication failure aborts the whole operation and returns no
//! partial data.

use kiosk_codec::{decode, encode, Block, BlockLayout, DecodeOutcome, BLOCK_SIZE};
use kiosk_types::CardId;
use serde_json::Value;
use tracing::{debug, trace};

use crate::transport::{CardTransport, KeyType, DEFAULT_KEY};
use crate::CardError;

/// Key material used to authenticate data blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CardKey {
    pub key_type: KeyType,
    pub key: [u8; 6],
}

impl Default for CardKey {
    fn default() -> Self {
        Self {
            key_type: KeyType::B,
            key: DEFAULT_KEY,
        }
    }
}

fn authenticate(
    transport: &mut dyn CardTransport,
    card: &CardId,
    block: u8,
    key: &CardKey,
) -> Result<(), CardError> {
    trace!(block, "authenticating block");
    if transport.authenticate_block(card, block, key.key_type, &key.key)? {
        Ok(())
    } else {
        Err(CardError::AuthenticationFailed { block })
    }
}

/// Read the full block budget of `layout` in usable-block order.
pub fn read_blocks(
    transport: &mut dyn CardTransport,
    card: &CardId,
    layout: &BlockLayout,
    key: &CardKey,
) -> Result<Vec<Block>, CardError> {
    let indices = layout.budget_blocks().ok_or(CardError::OutOfBlocks {
        start: layout.start_block,
        count: layout.block_budget,
    })?;

    let mut blocks = Vec::with_capacity(indices.len());
    for block in indices {
        authenticate(transport, card, block, key)?;
        blocks.push(transport.read_block(block)?);
    }
    debug!(card = %card, blocks = blocks.len(), "read card blocks");
    Ok(blocks)
}

/// Write pre-encoded blocks in order.
pub fn write_blocks(
    transport: &mut dyn CardTransport,
    card: &CardId,
    blocks: &[(u8, Block)],
    key: &CardKey,
) -> Result<(), CardError> {
    for (block, data) in blocks {
        authenticate(transport, card, *block, key)?;
        if !transport.write_block(*block, data)? {
            return Err(CardError::WriteRejected { block: *block });
        }
    }
    debug!(card = %card, blocks = blocks.len(), "wrote card blocks");
    Ok(())
}

/// Read and decode the payload stored under `layout`.
pub fn read_payload(
    transport: &mut dyn CardTransport,
    card: &CardId,
    layout: &BlockLayout,
    key: &CardKey,
) -> Result<DecodeOutcome, CardError> {
    let blocks = read_blocks(transport, card, layout, key)?;
    Ok(decode(&blocks))
}

/// Encode and write `payload`. The capacity check happens before any block
/// is touched.
///
/// Blocks past the end of the payload within the budget are zeroed so a
/// shorter payload does not leave a longer one's tail behind.
pub fn write_payload(
    transport: &mut dyn CardTransport,
    card: &CardId,
    payload: &Value,
    layout: &BlockLayout,
    key: &CardKey,
) -> Result<usize, CardError> {
    let mut blocks = encode(payload, layout)?;
    let written = blocks.len();
    if let Some(budget) = layout.budget_blocks() {
        blocks.extend(
            budget
                .into_iter()
                .skip(written)
                .map(|index| (index, [0u8; BLOCK_SIZE])),
        );
    }
    write_blocks(transport, card, &blocks, key)?;
    Ok(written)
}

/// Zero the first `count` usable blocks from `layout.start_block`.
pub fn format_card(
    transport: &mut dyn CardTransport,
    card: &CardId,
    layout: &BlockLayout,
    count: usize,
    key: &CardKey,
) -> Result<(), CardError> {
    let indices = layout.data_blocks(count).ok_or(CardError::OutOfBlocks {
        start: layout.start_block,
        count,
    })?;
    let zeroed: Vec<(u8, Block)> = indices
        .into_iter()
        .map(|index| (index, [0u8; BLOCK_SIZE]))
        .collect();
    write_blocks(transport, card, &zeroed, key)
}
