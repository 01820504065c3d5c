//! Kiosk daemon: entry point for the kiosk backend and card tools.

use anyhow::{bail, Context};
use clap::Parser;
use kiosk_card::{
    format_card, prepare_card_payload, provision_card, read_payload, CardKey, CardTransport,
    ImageTransport,
};
use kiosk_codec::{BlockLayout, DecodeOutcome};
use kiosk_node::{init_logging, KioskConfig, KioskNode};
use kiosk_registry::RegistryNetwork;
use kiosk_scanner::WaitOutcome;
use kiosk_types::CardId;
use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "kiosk", about = "Contactless card verification kiosk")]
struct Cli {
    /// Address for the HTTP and WebSocket server.
    #[arg(long, env = "KIOSK_LISTEN_ADDR")]
    listen_addr: Option<IpAddr>,

    /// Port for the HTTP and WebSocket server.
    #[arg(long, env = "KIOSK_PORT")]
    port: Option<u16>,

    /// Card image file used as the card reader.
    #[arg(long, env = "KIOSK_CARD_IMAGE")]
    card_image: Option<PathBuf>,

    /// Registry network: "mainnet", "preprod", or "preview".
    #[arg(long, env = "KIOSK_REGISTRY_NETWORK")]
    registry_network: Option<RegistryNetwork>,

    /// Registry base URL, overriding the network default.
    #[arg(long, env = "KIOSK_REGISTRY_URL")]
    registry_url: Option<String>,

    /// Seconds before a registry lookup is abandoned.
    #[arg(long, env = "KIOSK_REGISTRY_TIMEOUT_SECS")]
    registry_timeout_secs: Option<u64>,

    /// Registry API credential.
    #[arg(long, env = "KIOSK_REGISTRY_PROJECT_ID", hide_env_values = true)]
    registry_project_id: Option<String>,

    /// Extra registry attempts when the registry is unavailable.
    #[arg(long, env = "KIOSK_REGISTRY_RETRIES")]
    registry_retries: Option<u32>,

    /// First data block of the card payload.
    #[arg(long, env = "KIOSK_START_BLOCK")]
    start_block: Option<u8>,

    /// Number of usable data blocks reserved for the payload.
    #[arg(long, env = "KIOSK_BLOCK_BUDGET")]
    block_budget: Option<usize>,

    /// Seconds before the same card may be reported again.
    #[arg(long, env = "KIOSK_COOLDOWN_SECS")]
    cooldown_secs: Option<f64>,

    /// Seconds between scan loop iterations.
    #[arg(long, env = "KIOSK_TICK_SECS")]
    tick_secs: Option<f64>,

    /// Seconds each reader poll waits for a card.
    #[arg(long, env = "KIOSK_POLL_SECS")]
    poll_secs: Option<f64>,

    /// Seconds a manual verification waits for a card.
    #[arg(long, env = "KIOSK_REQUEST_TIMEOUT_SECS")]
    request_timeout_secs: Option<f64>,

    /// Seconds allowed for the scan loop to stop on shutdown.
    #[arg(long, env = "KIOSK_SHUTDOWN_TIMEOUT_SECS")]
    shutdown_timeout_secs: Option<f64>,

    /// Log format: "human" or "json".
    #[arg(long, env = "KIOSK_LOG_FORMAT")]
    log_format: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "KIOSK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "KIOSK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run the kiosk backend.
    Run,
    /// Wait for one card, verify it, and print the verdict.
    Verify,
    /// Write a credential pointer to the card and read it back.
    WriteTag {
        /// Registry key (policy id, hex).
        #[arg(long)]
        policy: String,
        /// Asset reference (asset name, hex).
        #[arg(long)]
        asset: String,
        /// Holder id.
        #[arg(long)]
        id: String,
    },
    /// Print the JSON stored on the card.
    ReadTag,
    /// Zero the card's data blocks.
    FormatTag {
        #[arg(long, default_value_t = 16)]
        blocks: usize,
    },
    /// Create a blank card image with factory keys.
    InitCard {
        /// Card UID, 4 bytes hex.
        #[arg(long, default_value = "04A1B2C3")]
        uid: String,
    },
}

impl Cli {
    fn apply(&self, config: &mut KioskConfig) {
        if let Some(addr) = self.listen_addr {
            config.listen_addr = addr;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(ref path) = self.card_image {
            config.card_image = path.clone();
        }
        if let Some(network) = self.registry_network {
            config.registry_network = network;
        }
        if let Some(ref url) = self.registry_url {
            config.registry_url = Some(url.clone());
        }
        if let Some(secs) = self.registry_timeout_secs {
            config.registry_timeout_secs = secs;
        }
        if let Some(ref project_id) = self.registry_project_id {
            config.registry_project_id = project_id.clone();
        }
        if let Some(retries) = self.registry_retries {
            config.registry_retries = retries;
        }
        if let Some(block) = self.start_block {
            config.start_block = block;
        }
        if let Some(budget) = self.block_budget {
            config.block_budget = budget;
        }
        if let Some(secs) = self.cooldown_secs {
            config.cooldown_secs = secs;
        }
        if let Some(secs) = self.tick_secs {
            config.tick_secs = secs;
        }
        if let Some(secs) = self.poll_secs {
            config.poll_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            config.request_timeout_secs = secs;
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            config.shutdown_timeout_secs = secs;
        }
        if let Some(ref format) = self.log_format {
            config.log_format = format.clone();
        }
        if let Some(ref level) = self.log_level {
            config.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => KioskConfig::from_toml_file(path)?,
        None => KioskConfig::default(),
    };
    cli.apply(&mut config);
    init_logging(config.log_format(), &config.log_level);
    if let Some(ref path) = cli.config {
        tracing::info!("loaded config from {}", path.display());
    }

    match cli.command {
        Command::Run => {
            tracing::info!(
                "starting kiosk on {} (registry: {}, card image: {})",
                config.socket_addr(),
                config.registry_network,
                config.card_image.display(),
            );
            let mut node = KioskNode::new(config)?;
            node.start().await?;

            tracing::info!("shutdown signal received, stopping kiosk");
            node.stop().await?;

            tracing::info!("kiosk exited cleanly");
        }
        Command::Verify => {
            let timeout = config.request_timeout();
            let node = KioskNode::new(config)?;
            let scanner = node.scanner().context("card reader unavailable")?;
            println!("Place card on reader...");
            match scanner.wait_for_card(timeout).await? {
                WaitOutcome::Verdict(verdict) => {
                    println!("{}", serde_json::to_string_pretty(&verdict)?);
                }
                WaitOutcome::NoCardDetected => bail!("no card detected within {timeout:?}"),
            }
        }
        Command::WriteTag { policy, asset, id } => {
            let layout = config.layout();
            let payload = prepare_card_payload(&policy, &asset, &id, &layout)?;
            println!("{}", serde_json::to_string_pretty(&payload)?);
            let blocks = with_card(&config, move |transport, card| {
                provision_card(transport, card, &payload, &layout, &CardKey::default())
                    .map_err(Into::into)
            })
            .await?;
            println!("wrote {blocks} blocks and verified read-back");
        }
        Command::ReadTag => {
            let layout = config.layout();
            let outcome = with_card(&config, move |transport, card| {
                read_payload(transport, card, &layout, &CardKey::default()).map_err(Into::into)
            })
            .await?;
            match outcome {
                DecodeOutcome::Payload(payload) => {
                    println!("{}", serde_json::to_string_pretty(&payload)?)
                }
                DecodeOutcome::Empty => println!("card is empty"),
                DecodeOutcome::Malformed(reason) => bail!("card data is not JSON: {reason}"),
            }
        }
        Command::FormatTag { blocks } => {
            let layout = BlockLayout::new(config.start_block, blocks);
            with_card(&config, move |transport, card| {
                format_card(transport, card, &layout, blocks, &CardKey::default())
                    .map_err(Into::into)
            })
            .await?;
            println!("zeroed {blocks} blocks");
        }
        Command::InitCard { uid } => {
            let bytes = hex::decode(&uid).context("uid must be hex")?;
            let uid: [u8; 4] = bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("uid must be exactly 4 bytes"))?;
            ImageTransport::create_blank(&config.card_image, &uid)?;
            println!("created blank card image {}", config.card_image.display());
        }
    }

    Ok(())
}

/// Open the card image, wait for the card, and run `f` on a blocking thread.
async fn with_card<T, F>(config: &KioskConfig, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&mut dyn CardTransport, &CardId) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let path = config.card_image.clone();
    let timeout = config.request_timeout();
    tokio::task::spawn_blocking(move || {
        let mut transport = ImageTransport::open(&path)?;
        println!("Place card on reader...");
        let Some(card) = transport.detect(timeout)? else {
            bail!("no card detected within {timeout:?}");
        };
        tracing::info!(card = %card, "card detected");
        f(&mut transport, &card)
    })
    .await?
}
