//! Turns repeated detections of a resting card into discrete scan events.
//!
//! Readers redetect a card lying on them many times per second. A detection
//! is accepted when it names a different card than the last accepted one, or
//! when the cooldown has elapsed since that acceptance.

use kiosk_types::CardId;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebounceState {
    pub last_card: Option<CardId>,
    pub last_event: Option<Instant>,
}

#[derive(Debug)]
pub struct Debouncer {
    cooldown: Duration,
    state: DebounceState,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            state: DebounceState::default(),
        }
    }

    /// Decide whether a detection of `card` at `now` is a new scan event.
    /// Accepting updates the state; rejecting leaves it untouched.
    pub fn accept(&mut self, card: &CardId, now: Instant) -> bool {
        let within_cooldown = self
            .state
            .last_event
            .is_some_and(|last| now.saturating_duration_since(last) < self.cooldown);
        if self.state.last_card.as_ref() == Some(card) && within_cooldown {
            return false;
        }
        self.state = DebounceState {
            last_card: Some(card.clone()),
            last_event: Some(now),
        };
        true
    }

    pub fn reset(&mut self) {
        self.state = DebounceState::default();
    }

    pub fn state(&self) -> &DebounceState {
        &self.state
    }
}
