//! Registry lookup: the authoritative store a card merely points to.
//!
//! The verification engine depends only on [`RegistryLookup`]. The
//! production implementation, [`HttpRegistry`], queries an asset registry
//! over HTTPS: `GET {base}/v0/assets/{registry_key}{asset_ref}` returns the
//! asset with its on-chain metadata, or `404` when no such asset exists.

pub mod client;
pub mod error;
pub mod lookup;
pub mod network;

pub use client::{record_from_metadata, HttpRegistry, RegistryConfig};
pub use error::RegistryError;
pub use lookup::RegistryLookup;
pub use network::RegistryNetwork;
