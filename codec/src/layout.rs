//! Card block layout: which indices carry data and in what order.

/// Bytes per card block.
pub const BLOCK_SIZE: usize = 16;

/// First data block on a MIFARE Classic card (sector 0 holds the manufacturer block).
pub const DEFAULT_START_BLOCK: u8 = 4;

/// Usable blocks per payload: 8 x 16 = 128 bytes.
pub const DEFAULT_BLOCK_BUDGET: usize = 8;

/// One raw card block.
pub type Block = [u8; BLOCK_SIZE];

/// Sector trailers sit at the end of every 4-block sector: 3, 7, 11, 15, ...
pub fn is_sector_trailer(index: u8) -> bool {
    (u16::from(index) + 1) % 4 == 0
}

/// Describes where a payload lives on the card.
///
/// `is_control_block` is a pure function of the index; the write path and
/// the read path each recompute the usable sequence from it.
#[derive(Clone, Copy, Debug)]
pub struct BlockLayout {
    pub start_block: u8,
    pub block_budget: usize,
    pub is_control_block: fn(u8) -> bool,
}

impl Default for BlockLayout {
    fn default() -> Self {
        Self {
            start_block: DEFAULT_START_BLOCK,
            block_budget: DEFAULT_BLOCK_BUDGET,
            is_control_block: is_sector_trailer,
        }
    }
}

impl BlockLayout {
    pub fn new(start_block: u8, block_budget: usize) -> Self {
        Self {
            start_block,
            block_budget,
            ..Self::default()
        }
    }

    /// Payload capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.block_budget * BLOCK_SIZE
    }

    /// Iterate usable block indices from `start_block` onward.
    pub fn usable_blocks(&self) -> UsableBlocks {
        UsableBlocks {
            next: Some(self.start_block),
            is_control_block: self.is_control_block,
        }
    }

    /// The first `count` usable block indices, or `None` if the card runs out.
    pub fn data_blocks(&self, count: usize) -> Option<Vec<u8>> {
        let blocks: Vec<u8> = self.usable_blocks().take(count).collect();
        (blocks.len() == count).then_some(blocks)
    }

    /// The usable indices covered by the full block budget.
    pub fn budget_blocks(&self) -> Option<Vec<u8>> {
        self.data_blocks(self.block_budget)
    }
}

/// Iterator over usable block indices. Ends at the last addressable block.
#[derive(Clone, Debug)]
pub struct UsableBlocks {
    next: Option<u8>,
    is_control_block: fn(u8) -> bool,
}

impl Iterator for UsableBlocks {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        loop {
            let index = self.next?;
            self.next = index.checked_add(1);
            if !(self.is_control_block)(index) {
                return Some(index);
            }
        }
    }
}
