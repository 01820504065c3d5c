//! Registry-held credential record.

use serde::{Deserialize, Serialize};

/// The authoritative record a card points to.
///
/// Owned by the registry. Read transiently per verification, never cached.
/// Missing optional fields are empty strings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub holder_id: String,
    #[serde(default)]
    pub holder_name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub issued_at: String,
}
