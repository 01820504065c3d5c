//! Card transport contract and block-level card sessions.
//!
//! The rest of the kiosk never talks to reader hardware directly. It depends
//! on the narrow [`CardTransport`] trait and on the session helpers in
//! [`session`], which authenticate and then read or write one block at a
//! time, strictly in order.
//!
//! All transport calls may block for up to their timeout; async callers must
//! dispatch them onto a blocking thread.

pub mod error;
pub mod image;
pub mod provision;
pub mod session;
pub mod transport;

pub use error::CardError;
pub use image::ImageTransport;
pub use provision::{prepare_card_payload, provision_card};
pub use session::{format_card, read_blocks, read_payload, write_blocks, write_payload, CardKey};
pub use transport::{CardTransport, KeyType, DEFAULT_KEY};
