//! The registry lookup contract.

use async_trait::async_trait;
use kiosk_types::RegistryRecord;

use crate::RegistryError;

/// Read-only access to the authoritative credential registry.
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    /// Fetch the record for a key/asset pair.
    ///
    /// `Ok(None)` means the registry answered and has no such record. Any
    /// `Err` means the registry could not be consulted.
    async fn lookup(
        &self,
        registry_key: &str,
        asset_ref: &str,
    ) -> Result<Option<RegistryRecord>, RegistryError>;

    /// Whether the registry currently answers health checks.
    async fn is_reachable(&self) -> bool;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}
