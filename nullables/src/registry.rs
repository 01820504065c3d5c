//! Nullable registry — in-memory records with a switchable outage.

use async_trait::async_trait;
use kiosk_registry::{RegistryError, RegistryLookup};
use kiosk_types::RegistryRecord;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// An in-memory registry for testing.
pub struct NullRegistry {
    records: Mutex<HashMap<(String, String), RegistryRecord>>,
    unavailable: AtomicBool,
    /// Number of upcoming lookups that fail before normal answers resume.
    failures_remaining: AtomicUsize,
    lookups: AtomicUsize,
}

impl NullRegistry {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            failures_remaining: AtomicUsize::new(0),
            lookups: AtomicUsize::new(0),
        }
    }

    /// Store a record under a key/asset pair.
    pub fn insert(&self, registry_key: &str, asset_ref: &str, record: RegistryRecord) {
        self.records
            .lock()
            .unwrap()
            .insert((registry_key.to_string(), asset_ref.to_string()), record);
    }

    /// Make every lookup fail until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` lookups, then answer normally.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    /// Number of lookups performed so far.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl Default for NullRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RegistryLookup for NullRegistry {
    async fn lookup(
        &self,
        registry_key: &str,
        asset_ref: &str,
    ) -> Result<Option<RegistryRecord>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RegistryError::Unreachable("null registry is offline".into()));
        }
        let pending = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(RegistryError::Unreachable("null registry transient failure".into()));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(registry_key.to_string(), asset_ref.to_string()))
            .cloned())
    }

    async fn is_reachable(&self) -> bool {
        !self.unavailable.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "null registry"
    }
}
