//! Scanner timing and card layout settings.

use kiosk_card::CardKey;
use kiosk_codec::BlockLayout;
use std::time::Duration;

/// Cooldown before the same card may trigger another scan event.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);
/// Pause between loop ticks.
pub const DEFAULT_TICK: Duration = Duration::from_millis(300);
/// How long one detect call waits for a card.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(500);
/// Pause between registry retries.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Clone, Debug)]
pub struct ScannerConfig {
    pub layout: BlockLayout,
    pub key: CardKey,
    pub cooldown: Duration,
    pub tick: Duration,
    pub poll_timeout: Duration,
    /// Extra registry attempts after an unavailable answer. Zero disables retries.
    pub registry_retries: u32,
    pub retry_backoff: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            layout: BlockLayout::default(),
            key: CardKey::default(),
            cooldown: DEFAULT_COOLDOWN,
            tick: DEFAULT_TICK,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            registry_retries: 0,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}
