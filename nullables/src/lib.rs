//! Nullable infrastructure for deterministic testing.
//!
//! The card reader and the registry are abstracted behind traits
//! ([`kiosk_card::CardTransport`], [`kiosk_registry::RegistryLookup`]).
//! This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically while in use
//! - Never touch hardware or the network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod registry;
pub mod transport;

pub use registry::NullRegistry;
pub use transport::{NullCard, NullReader, NullTransport};
