//! Outcome of one verification attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::card::CardId;
use crate::record::RegistryRecord;

/// Why a scan did not produce a verified holder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Card present, storage blank.
    EmptyCard,
    /// Storage present but not valid JSON.
    MalformedPayload,
    /// Valid JSON without the required pointer fields.
    InvalidCardFormat,
    /// The transport failed while reading the card.
    UnreadableCard,
    /// The transport rejected block authentication.
    AuthenticationFailed,
    /// The registry has no record for the key/asset pair.
    NotFound,
    /// The registry record names a different holder.
    IdentifierMismatch,
    /// The registry could not be reached.
    RegistryUnavailable,
    /// A single-shot wait timed out with no card detected.
    NoCardDetected,
}

impl ErrorKind {
    /// Human-readable message shown on the kiosk screen.
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptyCard => "Card is empty",
            Self::MalformedPayload => "Could not read card data",
            Self::InvalidCardFormat => "Invalid card format",
            Self::UnreadableCard => "Could not read card data",
            Self::AuthenticationFailed => "Card authentication failed",
            Self::NotFound => "Credential not found",
            Self::IdentifierMismatch => "ID mismatch",
            Self::RegistryUnavailable => "Registry unavailable",
            Self::NoCardDetected => "No card detected within timeout",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyCard => "empty_card",
            Self::MalformedPayload => "malformed_payload",
            Self::InvalidCardFormat => "invalid_card_format",
            Self::UnreadableCard => "unreadable_card",
            Self::AuthenticationFailed => "authentication_failed",
            Self::NotFound => "not_found",
            Self::IdentifierMismatch => "identifier_mismatch",
            Self::RegistryUnavailable => "registry_unavailable",
            Self::NoCardDetected => "no_card_detected",
        }
    }

    /// Expected states that are not worth logging as errors.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::EmptyCard)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one verification attempt.
///
/// A flat record that serializes to a stable JSON schema: the holder fields
/// are always present (empty when unknown) and `error_kind`/`error` only
/// appear on failures.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub verified: bool,
    pub card_id: String,
    pub holder_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub holder_name: String,
    pub department: String,
    pub issued_at: String,
}

impl Verdict {
    /// A successful verification populated from the registry record.
    pub fn verified(card: &CardId, record: &RegistryRecord, timestamp: DateTime<Utc>) -> Self {
        Self {
            verified: true,
            card_id: card.to_hex(),
            holder_id: record.holder_id.clone(),
            timestamp,
            error_kind: None,
            error: None,
            holder_name: record.holder_name.clone(),
            department: record.department.clone(),
            issued_at: record.issued_at.clone(),
        }
    }

    /// A failed verification. `holder_id` is whatever the card claimed, if
    /// anything could be read.
    pub fn failed(
        card: &CardId,
        holder_id: impl Into<String>,
        kind: ErrorKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            verified: false,
            card_id: card.to_hex(),
            holder_id: holder_id.into(),
            timestamp,
            error_kind: Some(kind),
            error: Some(kind.message().to_string()),
            holder_name: String::new(),
            department: String::new(),
            issued_at: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn verified_verdict_has_no_error_fields() {
        let record = RegistryRecord {
            holder_id: "42".into(),
            holder_name: "Ada".into(),
            department: "CS".into(),
            issued_at: "2024-01-01".into(),
        };
        let verdict = Verdict::verified(&CardId::new([1, 2, 3, 4]), &record, ts());
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["verified"], true);
        assert_eq!(json["card_id"], "01020304");
        assert_eq!(json["holder_name"], "Ada");
        assert!(json.get("error_kind").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn failed_verdict_keeps_schema_stable() {
        let verdict = Verdict::failed(
            &CardId::new([9]),
            "42",
            ErrorKind::IdentifierMismatch,
            ts(),
        );
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["verified"], false);
        assert_eq!(json["error_kind"], "identifier_mismatch");
        assert_eq!(json["error"], "ID mismatch");
        assert_eq!(json["holder_name"], "");
        assert_eq!(json["department"], "");
        assert_eq!(json["issued_at"], "");
    }

    #[test]
    fn error_kind_wire_name_matches_as_str() {
        for kind in [
            ErrorKind::EmptyCard,
            ErrorKind::MalformedPayload,
            ErrorKind::RegistryUnavailable,
            ErrorKind::NoCardDetected,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
    }
}
