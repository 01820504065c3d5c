//! Verdict fan-out.
//!
//! [`Broadcaster`] is a registry of subscriber handles; the scan loop calls
//! [`Broadcaster::broadcast`] once per accepted scan. Delivery never blocks,
//! and a subscriber that fails is pruned without affecting the others.
//!
//! The WebSocket route at `/ws/scan` registers one subscriber per connected
//! client. Clients receive a `connected` acknowledgement, then every verdict
//! broadcast after they connected. There is no replay of earlier events.

pub mod broadcast;
pub mod events;
pub mod server;

pub use broadcast::{BroadcastResult, Broadcaster, DeliveryError, Subscriber, SubscriberId};
pub use events::ScanEvent;
pub use server::{router, ChannelSubscriber};
