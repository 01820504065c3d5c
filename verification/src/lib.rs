//! Verification engine.
//!
//! Given the credential pointer decoded from a card, look up the record it
//! names in the registry and decide whether the card's holder claim is
//! backed by that record. Every failure mode becomes a typed outcome; nothing
//! here returns an error or panics on a bad card or an unreachable registry.

pub mod engine;
pub mod outcomes;

pub use engine::VerificationEngine;
pub use outcomes::VerifyOutcome;
