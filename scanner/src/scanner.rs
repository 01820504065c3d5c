//! Scan loop orchestration.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use kiosk_card::{read_payload, CardError, CardTransport};
use kiosk_codec::DecodeOutcome;
use kiosk_types::{CardId, CredentialPointer, ErrorKind, Verdict};
use kiosk_verification::VerificationEngine;
use kiosk_websocket::Broadcaster;
use tokio::sync::{Notify, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::ScannerConfig;
use crate::debounce::Debouncer;
use crate::error::ScannerError;

type SharedTransport = Arc<tokio::sync::Mutex<Box<dyn CardTransport>>>;
type TransportGuard = OwnedMutexGuard<Box<dyn CardTransport>>;

/// Result of a single-shot scan request.
#[derive(Clone, Debug)]
pub enum WaitOutcome {
    /// A card was read and produced this verdict.
    Verdict(Verdict),
    /// No card was presented before the deadline.
    NoCardDetected,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Gate {
    Debounced,
    Forced,
}

/// A detected card and what reading it produced.
struct Attempt {
    card: CardId,
    read: Result<DecodeOutcome, CardError>,
}

enum Evaluation {
    Pointer(CredentialPointer),
    Rejected(Verdict),
}

/// Owns the card transport and drives scans.
pub struct Scanner {
    transport: SharedTransport,
    engine: VerificationEngine,
    broadcaster: Arc<Broadcaster>,
    config: ScannerConfig,
    debouncer: Mutex<Debouncer>,
    running: AtomicBool,
    reader_connected: AtomicBool,
    wake: Notify,
    task: Mutex<Option<JoinHandle<Result<(), ScannerError>>>>,
}

impl Scanner {
    pub fn new(
        transport: Box<dyn CardTransport>,
        engine: VerificationEngine,
        broadcaster: Arc<Broadcaster>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            transport: Arc::new(tokio::sync::Mutex::new(transport)),
            engine,
            broadcaster,
            debouncer: Mutex::new(Debouncer::new(config.cooldown)),
            config,
            running: AtomicBool::new(false),
            reader_connected: AtomicBool::new(true),
            wake: Notify::new(),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// False once the transport has reported an unrecoverable fault.
    pub fn reader_connected(&self) -> bool {
        self.reader_connected.load(Ordering::SeqCst)
    }

    /// Start the continuous scan loop on the runtime.
    pub fn start(self: &Arc<Self>) -> Result<(), ScannerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ScannerError::AlreadyRunning);
        }
        self.debouncer().reset();
        let scanner = Arc::clone(self);
        let handle = tokio::spawn(async move { scanner.run().await });
        *self.task_slot() = Some(handle);
        info!(transport = %self.transport_name(), "scan loop started");
        Ok(())
    }

    /// Signal the loop to stop and wait up to `timeout` for it to finish.
    pub async fn stop(&self, timeout: Duration) -> Result<(), ScannerError> {
        self.running.store(false, Ordering::SeqCst);
        self.wake.notify_waiters();
        let Some(mut handle) = self.task_slot().take() else {
            return Ok(());
        };

        let result = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => {
                debug!("scan loop had already ended: {e}");
                Ok(())
            }
            Ok(Err(e)) => Err(ScannerError::Task(e.to_string())),
            Err(_) => {
                handle.abort();
                Err(ScannerError::ShutdownTimeout(timeout))
            }
        };
        self.debouncer().reset();
        info!("scan loop stopped");
        result
    }

    /// Wait up to `timeout` for a card and verify it, ignoring debounce.
    ///
    /// Cards that cannot be turned into a credential pointer do not end the
    /// wait. If the deadline passes after only such cards were seen, the last
    /// of their verdicts is returned instead of [`WaitOutcome::NoCardDetected`].
    pub async fn wait_for_card(&self, timeout: Duration) -> Result<WaitOutcome, ScannerError> {
        let deadline = Instant::now() + timeout;
        let mut last_rejection = None;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let poll = self.config.poll_timeout.min(remaining);
            let attempt =
                match tokio::time::timeout(remaining, self.attempt(Gate::Forced, poll)).await {
                    Ok(attempt) => attempt,
                    Err(_) => break,
                };

            match attempt {
                Ok(Some(attempt)) => {
                    let card = attempt.card.clone();
                    let span = info_span!("scan", card = %card, mode = "single");
                    match self.evaluate(attempt) {
                        Evaluation::Pointer(pointer) => {
                            let verdict = self.verify(&card, &pointer).instrument(span).await;
                            return Ok(WaitOutcome::Verdict(verdict));
                        }
                        Evaluation::Rejected(verdict) => {
                            span.in_scope(|| log_verdict(&verdict));
                            last_rejection = Some(verdict);
                        }
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => {
                    self.reader_connected.store(false, Ordering::SeqCst);
                    return Err(e);
                }
                Err(e) => warn!("scan attempt failed: {e}"),
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.config.tick.min(remaining)).await;
        }

        Ok(last_rejection
            .map(WaitOutcome::Verdict)
            .unwrap_or(WaitOutcome::NoCardDetected))
    }

    async fn run(&self) -> Result<(), ScannerError> {
        while self.is_running() {
            let Some(scanned) = self.until_stopped(self.scan_once()).await else {
                break;
            };
            match scanned {
                Ok(Some(verdict)) => {
                    let result = self.broadcaster.broadcast(&verdict);
                    debug!(sent = result.sent, failed = result.failed, "verdict broadcast");
                }
                Ok(None) => {}
                Err(e) if e.is_fatal() => {
                    error!("scan loop ending: {e}");
                    self.reader_connected.store(false, Ordering::SeqCst);
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
                Err(e) => warn!("scan attempt failed: {e}"),
            }

            if self
                .until_stopped(tokio::time::sleep(self.config.tick))
                .await
                .is_none()
            {
                break;
            }
        }
        debug!("scan loop observed stop");
        Ok(())
    }

    /// Drive `work` unless a stop arrives first. A stop drops `work` along
    /// with any registry call it has in flight.
    async fn until_stopped<F: Future>(&self, work: F) -> Option<F::Output> {
        let stopped = self.wake.notified();
        tokio::pin!(stopped);
        // Register before checking the flag so a concurrent stop is not lost.
        stopped.as_mut().enable();
        if !self.is_running() {
            return None;
        }
        tokio::select! {
            out = work => Some(out),
            _ = stopped => None,
        }
    }

    /// One continuous-mode step: detect, debounce, read, verify.
    async fn scan_once(&self) -> Result<Option<Verdict>, ScannerError> {
        let Some(attempt) = self.attempt(Gate::Debounced, self.config.poll_timeout).await? else {
            return Ok(None);
        };
        let card = attempt.card.clone();
        let span = info_span!("scan", card = %card, mode = "continuous");
        let verdict = match self.evaluate(attempt) {
            Evaluation::Pointer(pointer) => self.verify(&card, &pointer).instrument(span).await,
            Evaluation::Rejected(verdict) => {
                span.in_scope(|| log_verdict(&verdict));
                verdict
            }
        };
        Ok(Some(verdict))
    }

    /// Hold the session token while detecting and, for an accepted card,
    /// reading its payload.
    async fn attempt(&self, gate: Gate, poll: Duration) -> Result<Option<Attempt>, ScannerError> {
        let guard = Arc::clone(&self.transport).lock_owned().await;
        let (guard, detected) = on_transport(guard, move |t| t.detect(poll)).await?;
        let Some(card) = detected? else {
            return Ok(None);
        };

        if gate == Gate::Debounced && !self.debouncer().accept(&card, Instant::now()) {
            return Ok(None);
        }

        let layout = self.config.layout;
        let key = self.config.key;
        let id = card.clone();
        let (_guard, read) =
            on_transport(guard, move |t| read_payload(t, &id, &layout, &key)).await?;
        match read {
            Err(e) if e.is_fatal() => Err(e.into()),
            read => Ok(Some(Attempt { card, read })),
        }
    }

    fn evaluate(&self, attempt: Attempt) -> Evaluation {
        let Attempt { card, read } = attempt;
        let rejected =
            |kind: ErrorKind| Evaluation::Rejected(Verdict::failed(&card, "", kind, Utc::now()));
        let payload = match read {
            Ok(DecodeOutcome::Payload(payload)) => payload,
            Ok(DecodeOutcome::Empty) => return rejected(ErrorKind::EmptyCard),
            Ok(DecodeOutcome::Malformed(reason)) => {
                debug!(%card, "payload is not JSON: {reason}");
                return rejected(ErrorKind::MalformedPayload);
            }
            Err(CardError::AuthenticationFailed { block }) => {
                debug!(%card, block, "authentication failed");
                return rejected(ErrorKind::AuthenticationFailed);
            }
            Err(e) => {
                debug!(%card, "card read failed: {e}");
                return rejected(ErrorKind::UnreadableCard);
            }
        };
        match CredentialPointer::from_payload(&payload) {
            Ok(pointer) => Evaluation::Pointer(pointer),
            Err(e) => {
                debug!(%card, "not a credential pointer: {e}");
                rejected(ErrorKind::InvalidCardFormat)
            }
        }
    }

    /// Verify with bounded retries on registry unavailability.
    async fn verify(&self, card: &CardId, pointer: &CredentialPointer) -> Verdict {
        let mut retries_left = self.config.registry_retries;
        let outcome = loop {
            let outcome = self.engine.check(pointer).await;
            if !outcome.is_unavailable() || retries_left == 0 {
                break outcome;
            }
            retries_left -= 1;
            debug!(retries_left, "registry unavailable, retrying");
            tokio::time::sleep(self.config.retry_backoff).await;
        };
        let verdict = outcome.into_verdict(card, pointer, Utc::now());
        log_verdict(&verdict);
        verdict
    }

    fn transport_name(&self) -> String {
        self.transport
            .try_lock()
            .map(|t| t.name().to_string())
            .unwrap_or_else(|_| "busy".to_string())
    }

    fn debouncer(&self) -> MutexGuard<'_, Debouncer> {
        self.debouncer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn task_slot(&self) -> MutexGuard<'_, Option<JoinHandle<Result<(), ScannerError>>>> {
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Run a blocking transport call on the blocking pool, handing the session
/// token back with the result.
async fn on_transport<T, F>(
    mut guard: TransportGuard,
    f: F,
) -> Result<(TransportGuard, T), ScannerError>
where
    F: FnOnce(&mut dyn CardTransport) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let out = f(&mut **guard);
        (guard, out)
    })
    .await
    .map_err(|e| ScannerError::Task(e.to_string()))
}

fn log_verdict(verdict: &Verdict) {
    match verdict.error_kind {
        None => info!(holder = %verdict.holder_id, "card verified"),
        Some(kind) if kind.is_expected() => debug!(error_kind = %kind, "card rejected"),
        Some(kind) => info!(error_kind = %kind, "card rejected"),
    }
}
