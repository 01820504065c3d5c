//! Explicit registry network selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RegistryError;

/// Which registry deployment to query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryNetwork {
    Mainnet,
    #[default]
    Preprod,
    Preview,
}

impl RegistryNetwork {
    /// Base API URL for this network.
    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://cardano-mainnet.blockfrost.io/api",
            Self::Preprod => "https://cardano-preprod.blockfrost.io/api",
            Self::Preview => "https://cardano-preview.blockfrost.io/api",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Preprod => "preprod",
            Self::Preview => "preview",
        }
    }
}

impl fmt::Display for RegistryNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistryNetwork {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "preprod" => Ok(Self::Preprod),
            "preview" => Ok(Self::Preview),
            other => Err(RegistryError::UnknownNetwork(other.to_string())),
        }
    }
}
