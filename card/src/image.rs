//! File-backed MIFARE Classic 1K card image.
//!
//! Stands in for reader hardware on development machines and in kiosk
//! demos. The card is in the field while the image file exists; deleting or
//! moving the file takes it away. The card id is the first four bytes of
//! block 0, and authentication checks the presented key against the
//! sector trailer stored in the image, so a wrong key fails exactly as it
//! would on a real card.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use kiosk_codec::{is_sector_trailer, Block, BLOCK_SIZE};
use kiosk_types::CardId;
use tracing::debug;

use crate::transport::{CardTransport, KeyType, DEFAULT_KEY};
use crate::CardError;

/// Blocks on a 1K card.
pub const IMAGE_BLOCKS: usize = 64;

/// Size of a 1K card image in bytes.
pub const IMAGE_SIZE: usize = IMAGE_BLOCKS * BLOCK_SIZE;

/// Factory access bits (key A/B readable, data blocks read/write with either key).
const FACTORY_ACCESS_BITS: [u8; 4] = [0xff, 0x07, 0x80, 0x69];

#[derive(Debug)]
pub struct ImageTransport {
    path: PathBuf,
    card: Option<CardId>,
    authenticated: Option<u8>,
    name: String,
}

impl ImageTransport {
    /// Open a transport over `path`.
    ///
    /// The image itself may be absent (no card in the field), but its
    /// directory must exist and an existing image must be a full 1K dump.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CardError> {
        let path = path.into();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !dir.is_dir() {
            return Err(CardError::Disconnected(format!(
                "card image directory {} does not exist",
                dir.display()
            )));
        }
        if path.exists() {
            load_image(&path)?;
        }
        let name = format!("card image {}", path.display());
        Ok(Self {
            path,
            card: None,
            authenticated: None,
            name,
        })
    }

    /// Write a blank card image with factory keys and the given UID.
    pub fn create_blank(path: &Path, uid: &[u8; 4]) -> Result<(), CardError> {
        let mut image = vec![0u8; IMAGE_SIZE];
        image[..4].copy_from_slice(uid);
        image[4] = uid.iter().fold(0, |acc, b| acc ^ b);
        for block in (0..IMAGE_BLOCKS as u8).filter(|&b| is_sector_trailer(b)) {
            let offset = usize::from(block) * BLOCK_SIZE;
            image[offset..offset + 6].copy_from_slice(&DEFAULT_KEY);
            image[offset + 6..offset + 10].copy_from_slice(&FACTORY_ACCESS_BITS);
            image[offset + 10..offset + 16].copy_from_slice(&DEFAULT_KEY);
        }
        fs::write(path, image)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn require_authenticated(&self, block: u8) -> Result<(), CardError> {
        if self.authenticated == Some(block) {
            Ok(())
        } else {
            Err(CardError::Transport(format!("block {block} not authenticated")))
        }
    }

    fn present_image(&self) -> Result<Vec<u8>, CardError> {
        if !self.path.exists() {
            return Err(CardError::NoCard);
        }
        load_image(&self.path)
    }
}

fn load_image(path: &Path) -> Result<Vec<u8>, CardError> {
    let image = fs::read(path)?;
    if image.len() != IMAGE_SIZE {
        return Err(CardError::Transport(format!(
            "card image {} is {} bytes, expected {IMAGE_SIZE}",
            path.display(),
            image.len()
        )));
    }
    Ok(image)
}

fn block_range(block: u8) -> Result<std::ops::Range<usize>, CardError> {
    let index = usize::from(block);
    if index >= IMAGE_BLOCKS {
        return Err(CardError::Transport(format!("block {block} out of range")));
    }
    Ok(index * BLOCK_SIZE..(index + 1) * BLOCK_SIZE)
}

impl CardTransport for ImageTransport {
    fn detect(&mut self, timeout: Duration) -> Result<Option<CardId>, CardError> {
        if !self.path.exists() {
            self.card = None;
            self.authenticated = None;
            std::thread::sleep(timeout);
            return Ok(None);
        }
        let image = load_image(&self.path)?;
        let card = CardId::new(&image[..4]);
        debug!(card = %card, "card image present");
        self.card = Some(card.clone());
        self.authenticated = None;
        Ok(Some(card))
    }

    fn authenticate_block(
        &mut self,
        card: &CardId,
        block: u8,
        key_type: KeyType,
        key: &[u8; 6],
    ) -> Result<bool, CardError> {
        self.authenticated = None;
        if self.card.as_ref() != Some(card) {
            return Ok(false);
        }
        let image = self.present_image()?;
        block_range(block)?;
        let trailer = usize::from(block | 0x03) * BLOCK_SIZE;
        let stored = match key_type {
            KeyType::A => &image[trailer..trailer + 6],
            KeyType::B => &image[trailer + 10..trailer + 16],
        };
        if stored != key {
            return Ok(false);
        }
        self.authenticated = Some(block);
        Ok(true)
    }

    fn read_block(&mut self, block: u8) -> Result<Block, CardError> {
        self.require_authenticated(block)?;
        let image = self.present_image()?;
        let mut data = [0u8; BLOCK_SIZE];
        data.copy_from_slice(&image[block_range(block)?]);
        Ok(data)
    }

    fn write_block(&mut self, block: u8, data: &Block) -> Result<bool, CardError> {
        self.require_authenticated(block)?;
        if block == 0 {
            return Ok(false);
        }
        let mut image = self.present_image()?;
        image[block_range(block)?].copy_from_slice(data);
        fs::write(&self.path, image)?;
        Ok(true)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UID: [u8; 4] = [0x04, 0xa1, 0xb2, 0xc3];

    fn blank_card() -> (tempfile::TempDir, ImageTransport) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.bin");
        ImageTransport::create_blank(&path, &UID).unwrap();
        let transport = ImageTransport::open(&path).unwrap();
        (dir, transport)
    }

    #[test]
    fn detects_card_uid() {
        let (_dir, mut t) = blank_card();
        let card = t.detect(Duration::ZERO).unwrap().unwrap();
        assert_eq!(card.to_hex(), "04A1B2C3");
    }

    #[test]
    fn absent_image_means_no_card() {
        let dir = tempfile::tempdir().unwrap();
        let mut t = ImageTransport::open(dir.path().join("card.bin")).unwrap();
        assert!(t.detect(Duration::from_millis(1)).unwrap().is_none());
    }

    #[test]
    fn missing_directory_fails_to_open() {
        let err = ImageTransport::open("/nonexistent-kiosk-dir/card.bin").unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn truncated_image_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("card.bin");
        fs::write(&path, [0u8; 100]).unwrap();
        assert!(ImageTransport::open(&path).is_err());
    }

    #[test]
    fn write_then_read_block() {
        let (_dir, mut t) = blank_card();
        let card = t.detect(Duration::ZERO).unwrap().unwrap();
        assert!(t.authenticate_block(&card, 4, KeyType::B, &DEFAULT_KEY).unwrap());
        assert!(t.write_block(4, &[7u8; 16]).unwrap());
        assert!(t.authenticate_block(&card, 4, KeyType::A, &DEFAULT_KEY).unwrap());
        assert_eq!(t.read_block(4).unwrap(), [7u8; 16]);
    }

    #[test]
    fn wrong_key_is_rejected() {
        let (_dir, mut t) = blank_card();
        let card = t.detect(Duration::ZERO).unwrap().unwrap();
        assert!(!t.authenticate_block(&card, 5, KeyType::B, &[0u8; 6]).unwrap());
        assert!(t.read_block(5).is_err());
    }

    #[test]
    fn read_requires_authentication_of_that_block() {
        let (_dir, mut t) = blank_card();
        let card = t.detect(Duration::ZERO).unwrap().unwrap();
        assert!(t.authenticate_block(&card, 4, KeyType::B, &DEFAULT_KEY).unwrap());
        assert!(t.read_block(5).is_err());
    }

    #[test]
    fn manufacturer_block_is_read_only() {
        let (_dir, mut t) = blank_card();
        let card = t.detect(Duration::ZERO).unwrap().unwrap();
        assert!(t.authenticate_block(&card, 0, KeyType::B, &DEFAULT_KEY).unwrap());
        assert!(!t.write_block(0, &[0u8; 16]).unwrap());
    }
}
