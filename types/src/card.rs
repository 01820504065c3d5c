//! Card identifier surfaced by the transport.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Opaque per-card identifier (the card UID).
///
/// Only ever compared for equality and displayed as uppercase hex; the bytes
/// are never interpreted.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CardId(Vec<u8>);

impl CardId {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Uppercase hex rendering, e.g. `04A1B2C3`.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(&self.0)
    }
}

impl fmt::Debug for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CardId({})", self.to_hex())
    }
}

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for CardId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for CardId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s)
            .map(CardId)
            .map_err(serde::de::Error::custom)
    }
}
