//! Fundamental types for the verification kiosk.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! card identifiers, the credential pointer stored on a card, the registry
//! record it points to, and the verdict produced for each scan.

pub mod card;
pub mod credential;
pub mod error;
pub mod record;
pub mod verdict;

pub use card::CardId;
pub use credential::{holder_id_from_json, CredentialPointer};
pub use error::PointerError;
pub use record::RegistryRecord;
pub use verdict::{ErrorKind, Verdict};
