//! Block codec for contactless memory cards.
//!
//! A JSON payload is serialized compactly and spread over consecutive usable
//! 16-byte blocks, skipping control (sector trailer) blocks. Reading reverses
//! the process. Both directions derive the block sequence independently from
//! the same [`BlockLayout`], so a payload written with one layout reads back
//! with the same layout.

pub mod codec;
pub mod error;
pub mod layout;

pub use codec::{decode, encode, encoded_len, DecodeOutcome};
pub use error::CodecError;
pub use layout::{
    is_sector_trailer, Block, BlockLayout, UsableBlocks, BLOCK_SIZE, DEFAULT_BLOCK_BUDGET,
    DEFAULT_START_BLOCK,
};
