//! The kiosk node: owns every long-lived component and their tasks.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::Router;
use kiosk_card::{CardTransport, ImageTransport};
use kiosk_registry::{HttpRegistry, RegistryLookup};
use kiosk_rpc::RpcState;
use kiosk_scanner::{Scanner, ScannerError};
use kiosk_verification::VerificationEngine;
use kiosk_websocket::Broadcaster;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::KioskConfig;
use crate::error::NodeError;
use crate::shutdown::ShutdownController;

/// Front-end origins allowed to call the API from a browser.
const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

/// Timeout for the HTTP server task to drain after shutdown.
const SERVER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

pub struct KioskNode {
    pub config: KioskConfig,
    pub shutdown: Arc<ShutdownController>,
    registry: Arc<dyn RegistryLookup>,
    broadcaster: Arc<Broadcaster>,
    /// Absent when the card reader could not be opened.
    scanner: Option<Arc<Scanner>>,
    /// Handles for spawned background tasks (joined during shutdown).
    task_handles: Vec<JoinHandle<()>>,
}

impl KioskNode {
    /// Build the node from configuration: the HTTP registry client and the
    /// card image reader. A reader that fails to open leaves the node
    /// running degraded, without a scanner.
    pub fn new(config: KioskConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let registry: Arc<dyn RegistryLookup> =
            Arc::new(HttpRegistry::new(config.registry_config())?);

        let transport: Option<Box<dyn CardTransport>> =
            match ImageTransport::open(&config.card_image) {
                Ok(transport) => Some(Box::new(transport)),
                Err(e) => {
                    tracing::warn!("card reader unavailable, running degraded: {e}");
                    None
                }
            };

        Ok(Self::with_components(config, transport, registry))
    }

    /// Build the node around an already opened transport and registry.
    pub fn with_components(
        config: KioskConfig,
        transport: Option<Box<dyn CardTransport>>,
        registry: Arc<dyn RegistryLookup>,
    ) -> Self {
        let broadcaster = Arc::new(Broadcaster::new());
        let scanner = transport.map(|transport| {
            tracing::info!(reader = transport.name(), "card reader opened");
            Arc::new(Scanner::new(
                transport,
                VerificationEngine::new(Arc::clone(&registry)),
                Arc::clone(&broadcaster),
                config.scanner_config(),
            ))
        });

        Self {
            config,
            shutdown: Arc::new(ShutdownController::new()),
            registry,
            broadcaster,
            scanner,
            task_handles: Vec::new(),
        }
    }

    pub fn scanner(&self) -> Option<&Arc<Scanner>> {
        self.scanner.as_ref()
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    /// The full HTTP surface: REST API, WebSocket channel, CORS.
    pub fn router(&self) -> Router {
        let rpc = kiosk_rpc::router(RpcState {
            scanner: self.scanner.clone(),
            registry: Arc::clone(&self.registry),
            broadcaster: Arc::clone(&self.broadcaster),
            verify_timeout: self.config.request_timeout(),
        });
        let cors = CorsLayer::new()
            .allow_origin(AllowOrigin::list(
                ALLOWED_ORIGINS.map(HeaderValue::from_static),
            ))
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(Any);

        rpc.merge(kiosk_websocket::router(Arc::clone(&self.broadcaster)))
            .layer(cors)
    }

    /// Start the scan loop and serve HTTP on `listener` in the background.
    /// Returns the bound address.
    pub async fn launch(&mut self, listener: TcpListener) -> Result<SocketAddr, NodeError> {
        let addr = listener.local_addr()?;

        if let Some(scanner) = &self.scanner {
            scanner.start()?;
        } else {
            tracing::warn!("no card reader; only manual requests will report its absence");
        }

        let app = self.router();
        let mut shutdown_rx = self.shutdown.subscribe();
        let server_handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.recv().await;
                    tracing::info!("HTTP server shutting down");
                })
                .await;
            match result {
                Ok(()) => tracing::info!("HTTP server exited"),
                Err(e) => tracing::error!("HTTP server error: {e}"),
            }
        });
        self.task_handles.push(server_handle);

        tracing::info!(
            %addr,
            registry = self.registry.name(),
            reader = self.scanner.is_some(),
            "kiosk started"
        );
        Ok(addr)
    }

    /// Bind the configured address, launch, and run until SIGINT/SIGTERM.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| NodeError::Server(format!("bind {addr}: {e}")))?;
        self.launch(listener).await?;

        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Stop the node gracefully.
    ///
    /// 1. Sends the shutdown signal to the HTTP server.
    /// 2. Stops the scan loop within the configured shutdown timeout.
    /// 3. Waits for background tasks to complete (with timeout).
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("kiosk stopping");
        self.shutdown.shutdown();

        let mut result = Ok(());
        if let Some(scanner) = &self.scanner {
            match scanner.stop(self.config.shutdown_timeout()).await {
                Ok(()) => {}
                Err(ScannerError::ShutdownTimeout(timeout)) => {
                    tracing::error!(?timeout, "scan loop did not stop in time");
                    result = Err(NodeError::ShutdownTimeout);
                }
                Err(e) => result = Err(e.into()),
            }
        }

        for handle in self.task_handles.drain(..) {
            let abort = handle.abort_handle();
            if tokio::time::timeout(SERVER_DRAIN_TIMEOUT, handle).await.is_err() {
                tracing::warn!("background task did not finish, aborting");
                abort.abort();
            }
        }

        tracing::info!("kiosk stopped");
        result
    }
}
