//! WebSocket live subscription channel.
//!
//! Serves `/ws/scan`. Each connection registers a [`ChannelSubscriber`]
//! with the shared [`Broadcaster`]; a forwarder task drains its queue into
//! the socket. Client messages are ignored apart from close and ping.

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use kiosk_types::Verdict;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::broadcast::{Broadcaster, DeliveryError, Subscriber};
use crate::events::ScanEvent;

/// Per-client queue depth. A client this far behind is dropped.
const CLIENT_QUEUE_CAPACITY: usize = 64;

/// Subscriber that queues serialized scan events onto a bounded channel.
pub struct ChannelSubscriber {
    tx: mpsc::Sender<String>,
}

impl ChannelSubscriber {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

impl Subscriber for ChannelSubscriber {
    fn notify(&self, verdict: &Verdict) -> Result<(), DeliveryError> {
        let message = ScanEvent::Scan(verdict.clone()).to_json();
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Lagging,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Router serving `/ws/scan` against `broadcaster`.
pub fn router(broadcaster: Arc<Broadcaster>) -> Router {
    Router::new()
        .route("/ws/scan", get(ws_handler))
        .with_state(broadcaster)
}

/// Axum handler that upgrades an HTTP request to a WebSocket connection.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(broadcaster): State<Arc<Broadcaster>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, broadcaster))
}

/// Handle a single WebSocket connection.
///
/// 1. Send the `connected` acknowledgement.
/// 2. Register a subscriber and spawn a forwarder for its queue.
/// 3. Read client frames until the client goes away.
/// 4. Unregister and stop the forwarder.
async fn handle_socket(socket: WebSocket, broadcaster: Arc<Broadcaster>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    if ws_sender
        .send(Message::Text(ScanEvent::connected().to_json()))
        .await
        .is_err()
    {
        return;
    }

    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_QUEUE_CAPACITY);
    let id = broadcaster.subscribe(Arc::new(ChannelSubscriber::new(tx)));
    debug!("WebSocket client connected");

    let forwarder = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if ws_sender.send(Message::Text(message)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg_result) = ws_receiver.next().await {
        match msg_result {
            Ok(Message::Close(_)) => {
                debug!("Client sent close frame");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    broadcaster.unsubscribe(id);
    forwarder.abort();
    debug!("WebSocket client disconnected");
}
