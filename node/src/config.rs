//! Kiosk configuration with TOML file support.

use kiosk_card::CardKey;
use kiosk_codec::{is_sector_trailer, BlockLayout, DEFAULT_BLOCK_BUDGET, DEFAULT_START_BLOCK};
use kiosk_registry::{RegistryConfig, RegistryNetwork};
use kiosk_scanner::ScannerConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logging::LogFormat;
use crate::NodeError;

/// Configuration for the kiosk backend.
///
/// Can be loaded from a TOML file via [`KioskConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). Command-line flags override
/// individual fields after loading.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KioskConfig {
    /// Address the HTTP and WebSocket server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: IpAddr,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Card image used by the file-backed reader.
    #[serde(default = "default_card_image")]
    pub card_image: PathBuf,

    #[serde(default)]
    pub registry_network: RegistryNetwork,

    /// Overrides the network's registry base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_url: Option<String>,

    #[serde(default)]
    pub registry_project_id: String,

    #[serde(default = "default_registry_timeout_secs")]
    pub registry_timeout_secs: u64,

    #[serde(default = "default_start_block")]
    pub start_block: u8,

    /// Usable blocks per payload.
    #[serde(default = "default_block_budget")]
    pub block_budget: usize,

    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: f64,

    #[serde(default = "default_tick_secs")]
    pub tick_secs: f64,

    #[serde(default = "default_poll_secs")]
    pub poll_secs: f64,

    /// How long `POST /api/verify` waits for a card.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: f64,

    #[serde(default)]
    pub registry_retries: u32,

    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: f64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_listen_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    5000
}

fn default_card_image() -> PathBuf {
    PathBuf::from("./card.bin")
}

fn default_registry_timeout_secs() -> u64 {
    30
}

fn default_start_block() -> u8 {
    DEFAULT_START_BLOCK
}

fn default_block_budget() -> usize {
    DEFAULT_BLOCK_BUDGET
}

fn default_cooldown_secs() -> f64 {
    3.0
}

fn default_tick_secs() -> f64 {
    0.3
}

fn default_poll_secs() -> f64 {
    0.5
}

fn default_request_timeout_secs() -> f64 {
    10.0
}

fn default_shutdown_timeout_secs() -> f64 {
    5.0
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl KioskConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            NodeError::Config(format!("{}: {e}", path.as_ref().display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Reject settings the kiosk cannot run with. An empty registry
    /// credential is allowed but logged.
    pub fn validate(&self) -> Result<(), NodeError> {
        for (name, secs) in [
            ("cooldown_secs", self.cooldown_secs),
            ("tick_secs", self.tick_secs),
            ("poll_secs", self.poll_secs),
            ("request_timeout_secs", self.request_timeout_secs),
            ("shutdown_timeout_secs", self.shutdown_timeout_secs),
        ] {
            secs_to_duration(name, secs)?;
        }
        if self.block_budget == 0 {
            return Err(NodeError::Config("block_budget must be at least 1".into()));
        }
        if is_sector_trailer(self.start_block) {
            return Err(NodeError::Config(format!(
                "start_block {} is a sector trailer",
                self.start_block
            )));
        }
        if self.layout().budget_blocks().is_none() {
            return Err(NodeError::Config(format!(
                "{} blocks from block {} do not fit on the card",
                self.block_budget, self.start_block
            )));
        }
        self.log_format
            .parse::<LogFormat>()
            .map_err(NodeError::Config)?;
        if self.registry_project_id.trim().is_empty() {
            tracing::warn!("registry_project_id is empty; registry lookups will likely fail");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_addr, self.port)
    }

    pub fn log_format(&self) -> LogFormat {
        self.log_format.parse().unwrap_or(LogFormat::Human)
    }

    pub fn layout(&self) -> BlockLayout {
        BlockLayout::new(self.start_block, self.block_budget)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            network: self.registry_network,
            base_url: self.registry_url.clone(),
            project_id: self.registry_project_id.clone(),
            timeout: Duration::from_secs(self.registry_timeout_secs),
        }
    }

    /// Scanner settings. Call [`validate`](Self::validate) first; invalid
    /// durations fall back to the scanner defaults.
    pub fn scanner_config(&self) -> ScannerConfig {
        let defaults = ScannerConfig::default();
        ScannerConfig {
            layout: self.layout(),
            key: CardKey::default(),
            cooldown: secs_or(self.cooldown_secs, defaults.cooldown),
            tick: secs_or(self.tick_secs, defaults.tick),
            poll_timeout: secs_or(self.poll_secs, defaults.poll_timeout),
            registry_retries: self.registry_retries,
            retry_backoff: defaults.retry_backoff,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        secs_or(self.request_timeout_secs, Duration::from_secs(10))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        secs_or(self.shutdown_timeout_secs, Duration::from_secs(5))
    }
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            port: default_port(),
            card_image: default_card_image(),
            registry_network: RegistryNetwork::default(),
            registry_url: None,
            registry_project_id: String::new(),
            registry_timeout_secs: default_registry_timeout_secs(),
            start_block: default_start_block(),
            block_budget: default_block_budget(),
            cooldown_secs: default_cooldown_secs(),
            tick_secs: default_tick_secs(),
            poll_secs: default_poll_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            registry_retries: 0,
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

fn secs_to_duration(name: &str, secs: f64) -> Result<Duration, NodeError> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| NodeError::Config(format!("{name} must be a non-negative number of seconds")))
}

fn secs_or(secs: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = KioskConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = KioskConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.port, config.port);
        assert_eq!(parsed.registry_network, config.registry_network);
        assert_eq!(parsed.tick_secs, config.tick_secs);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = KioskConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.port, 5000);
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:5000");
        assert_eq!(config.registry_network, RegistryNetwork::Preprod);
        assert_eq!(config.start_block, 4);
        assert_eq!(config.block_budget, 8);
        assert_eq!(config.log_format, "human");

        let scanner = config.scanner_config();
        assert_eq!(scanner.cooldown, Duration::from_secs(3));
        assert_eq!(scanner.tick, Duration::from_millis(300));
        assert_eq!(scanner.poll_timeout, Duration::from_millis(500));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            port = 8080
            registry_network = "mainnet"
            registry_project_id = "mainnetABC"
            cooldown_secs = 1.5
        "#;
        let config = KioskConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.port, 8080);
        assert_eq!(config.registry_network, RegistryNetwork::Mainnet);
        assert_eq!(config.registry_config().project_id, "mainnetABC");
        assert_eq!(config.scanner_config().cooldown, Duration::from_millis(1500));
        assert_eq!(config.log_level, "info"); // default
    }

    #[test]
    fn unknown_network_is_rejected() {
        let result = KioskConfig::from_toml_str(r#"registry_network = "testnet""#);
        assert!(matches!(result, Err(NodeError::Config(_))));
    }

    #[test]
    fn validation_catches_bad_layout_and_durations() {
        let mut config = KioskConfig::default();
        assert!(config.validate().is_ok());

        config.start_block = 7;
        assert!(config.validate().is_err());

        let mut config = KioskConfig {
            block_budget: 0,
            ..KioskConfig::default()
        };
        assert!(config.validate().is_err());

        config.block_budget = 8;
        config.tick_secs = -1.0;
        assert!(config.validate().is_err());

        let config = KioskConfig {
            log_format: "xml".into(),
            ..KioskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kiosk.toml");
        std::fs::write(&path, "port = 6000\nlog_format = \"json\"\n").unwrap();
        let config = KioskConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.log_format(), LogFormat::Json);
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = KioskConfig::from_toml_file("/nonexistent/kiosk.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
