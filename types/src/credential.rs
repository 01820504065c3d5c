//! The credential pointer a card stores.
//!
//! Card capacity is tight, so the stored object uses single-letter keys:
//! `p` is the registry key (policy), `a` the asset reference and `s` the
//! holder identifier.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PointerError;

pub const REGISTRY_KEY_FIELD: &str = "p";
pub const ASSET_REF_FIELD: &str = "a";
pub const HOLDER_ID_FIELD: &str = "s";

/// Pointer from a physical card to a record held by the registry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPointer {
    pub registry_key: String,
    pub asset_ref: String,
    pub holder_id: String,
}

impl CredentialPointer {
    pub fn new(
        registry_key: impl Into<String>,
        asset_ref: impl Into<String>,
        holder_id: impl Into<String>,
    ) -> Self {
        Self {
            registry_key: registry_key.into(),
            asset_ref: asset_ref.into(),
            holder_id: holder_id.into(),
        }
    }

    /// Interpret a decoded card payload.
    ///
    /// All three fields must be present and non-empty. The holder id may be
    /// stored as a JSON string or number.
    pub fn from_payload(payload: &Value) -> Result<Self, PointerError> {
        let object = payload.as_object().ok_or(PointerError::NotAnObject)?;

        let text_field = |name: &'static str| -> Result<String, PointerError> {
            let value = object.get(name).ok_or(PointerError::MissingField(name))?;
            let text = match value {
                Value::String(s) => s.clone(),
                _ => return Err(PointerError::InvalidField(name)),
            };
            if text.is_empty() {
                return Err(PointerError::EmptyField(name));
            }
            Ok(text)
        };

        let registry_key = text_field(REGISTRY_KEY_FIELD)?;
        let asset_ref = text_field(ASSET_REF_FIELD)?;

        let holder = object
            .get(HOLDER_ID_FIELD)
            .ok_or(PointerError::MissingField(HOLDER_ID_FIELD))?;
        let holder_id =
            holder_id_from_json(holder).ok_or(PointerError::InvalidField(HOLDER_ID_FIELD))?;
        if holder_id.is_empty() {
            return Err(PointerError::EmptyField(HOLDER_ID_FIELD));
        }

        Ok(Self {
            registry_key,
            asset_ref,
            holder_id,
        })
    }

    /// The compact JSON object written to a card.
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            REGISTRY_KEY_FIELD: self.registry_key,
            ASSET_REF_FIELD: self.asset_ref,
            HOLDER_ID_FIELD: self.holder_id,
        })
    }
}

/// Textual form of a holder identifier.
///
/// Strings are taken verbatim (no trimming, leading zeros significant) and
/// numbers use their JSON rendering, so `"42"` and `42` both yield `"42"`.
/// Any other JSON type has no textual form.
pub fn holder_id_from_json(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
