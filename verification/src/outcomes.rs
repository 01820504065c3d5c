//! Typed result of a registry round trip.

use chrono::{DateTime, Utc};
use kiosk_types::{CardId, CredentialPointer, ErrorKind, RegistryRecord, Verdict};

/// What the registry said about a credential pointer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Record found and its holder matches the card.
    Verified(RegistryRecord),
    /// The registry has no record for the key/asset pair.
    NotFound,
    /// Record found but names a different holder.
    Mismatch { card: String, registry: String },
    /// The registry could not be consulted.
    Unavailable(String),
}

impl VerifyOutcome {
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Verified(_) => None,
            Self::NotFound => Some(ErrorKind::NotFound),
            Self::Mismatch { .. } => Some(ErrorKind::IdentifierMismatch),
            Self::Unavailable(_) => Some(ErrorKind::RegistryUnavailable),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Fold into the verdict handed to subscribers and callers.
    pub fn into_verdict(
        self,
        card: &CardId,
        pointer: &CredentialPointer,
        timestamp: DateTime<Utc>,
    ) -> Verdict {
        match self {
            Self::Verified(record) => Verdict::verified(card, &record, timestamp),
            Self::NotFound => Verdict::failed(card, &pointer.holder_id, ErrorKind::NotFound, timestamp),
            Self::Mismatch { .. } => Verdict::failed(
                card,
                &pointer.holder_id,
                ErrorKind::IdentifierMismatch,
                timestamp,
            ),
            Self::Unavailable(_) => Verdict::failed(
                card,
                &pointer.holder_id,
                ErrorKind::RegistryUnavailable,
                timestamp,
            ),
        }
    }
}
