//! Registry reconciliation.

use std::sync::Arc;

use chrono::Utc;
use kiosk_registry::RegistryLookup;
use kiosk_types::{CardId, CredentialPointer, Verdict};
use tracing::{debug, info_span, warn, Instrument};

use crate::outcomes::VerifyOutcome;

/// Checks credential pointers against the registry.
///
/// Does not retry; a failed registry round trip is reported as
/// [`VerifyOutcome::Unavailable`] and retry policy is left to the caller.
#[derive(Clone)]
pub struct VerificationEngine {
    registry: Arc<dyn RegistryLookup>,
}

impl VerificationEngine {
    pub fn new(registry: Arc<dyn RegistryLookup>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn RegistryLookup> {
        &self.registry
    }

    /// One registry round trip for `pointer`.
    pub async fn check(&self, pointer: &CredentialPointer) -> VerifyOutcome {
        let span = info_span!("verify", registry_key = %pointer.registry_key, asset = %pointer.asset_ref);
        async {
            let record = match self
                .registry
                .lookup(&pointer.registry_key, &pointer.asset_ref)
                .await
            {
                Ok(Some(record)) => record,
                Ok(None) => {
                    debug!("no registry record");
                    return VerifyOutcome::NotFound;
                }
                Err(e) => {
                    warn!("registry lookup failed: {e}");
                    return VerifyOutcome::Unavailable(e.to_string());
                }
            };

            // Both sides are already in textual form; see `holder_id_from_json`.
            if record.holder_id != pointer.holder_id {
                debug!(card = %pointer.holder_id, registry = %record.holder_id, "holder id mismatch");
                return VerifyOutcome::Mismatch {
                    card: pointer.holder_id.clone(),
                    registry: record.holder_id,
                };
            }

            VerifyOutcome::Verified(record)
        }
        .instrument(span)
        .await
    }

    /// Verify `pointer` read from `card` and build the verdict.
    pub async fn verify(&self, card: &CardId, pointer: &CredentialPointer) -> Verdict {
        self.check(pointer)
            .await
            .into_verdict(card, pointer, Utc::now())
    }
}
