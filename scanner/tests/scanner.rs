use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use kiosk_card::{CardError, CardTransport, KeyType};
use kiosk_codec::Block;
use kiosk_nullables::{NullCard, NullReader, NullRegistry, NullTransport};
use kiosk_registry::{RegistryError, RegistryLookup};
use kiosk_scanner::{Scanner, ScannerConfig, ScannerError, WaitOutcome};
use kiosk_types::{CardId, ErrorKind, RegistryRecord, Verdict};
use kiosk_verification::VerificationEngine;
use kiosk_websocket::{Broadcaster, DeliveryError, Subscriber};
use serde_json::json;

const UID_A: [u8; 4] = [0x04, 0xA1, 0xB2, 0xC3];
const UID_B: [u8; 4] = [0x04, 0x0B, 0x0B, 0x0B];

#[derive(Default)]
struct Recorder {
    verdicts: Mutex<Vec<Verdict>>,
}

impl Recorder {
    fn verdicts(&self) -> Vec<Verdict> {
        self.verdicts.lock().unwrap().clone()
    }

    fn len(&self) -> usize {
        self.verdicts.lock().unwrap().len()
    }
}

impl Subscriber for Recorder {
    fn notify(&self, verdict: &Verdict) -> Result<(), DeliveryError> {
        self.verdicts.lock().unwrap().push(verdict.clone());
        Ok(())
    }
}

struct Harness {
    scanner: Arc<Scanner>,
    reader: NullReader,
    registry: Arc<NullRegistry>,
    recorder: Arc<Recorder>,
}

fn fast_config() -> ScannerConfig {
    ScannerConfig {
        tick: Duration::from_millis(20),
        poll_timeout: Duration::from_millis(20),
        retry_backoff: Duration::from_millis(10),
        ..ScannerConfig::default()
    }
}

fn harness(config: ScannerConfig) -> Harness {
    let transport = NullTransport::new();
    let reader = transport.reader();
    let registry = Arc::new(NullRegistry::new());
    registry.insert(
        "policy",
        "asset",
        RegistryRecord {
            holder_id: "S-001".into(),
            holder_name: "Grace Hopper".into(),
            department: "Computing".into(),
            issued_at: "2024-01-15".into(),
        },
    );
    let broadcaster = Arc::new(Broadcaster::new());
    let recorder = Arc::new(Recorder::default());
    broadcaster.subscribe(recorder.clone());
    let scanner = Arc::new(Scanner::new(
        Box::new(transport),
        VerificationEngine::new(registry.clone()),
        broadcaster,
        config,
    ));
    Harness {
        scanner,
        reader,
        registry,
        recorder,
    }
}

fn valid_card(uid: &[u8]) -> NullCard {
    NullCard::with_payload(uid, &json!({"p": "policy", "a": "asset", "s": "S-001"}))
}

async fn until(mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn continuous_scan_broadcasts_one_verdict_per_resting_card() {
    let h = harness(fast_config());
    h.reader.place(valid_card(&UID_A));
    h.scanner.start().unwrap();

    until(|| h.recorder.len() == 1).await;
    // Many more ticks pass while the card rests on the reader.
    let calls = h.reader.detect_calls();
    until(|| h.reader.detect_calls() > calls + 5).await;
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();

    let verdicts = h.recorder.verdicts();
    assert_eq!(verdicts.len(), 1);
    assert!(verdicts[0].verified);
    assert_eq!(verdicts[0].card_id, "04A1B2C3");
    assert_eq!(verdicts[0].holder_name, "Grace Hopper");
    assert_eq!(h.registry.lookup_count(), 1);
}

#[tokio::test]
async fn switching_cards_produces_a_new_event() {
    let h = harness(fast_config());
    h.reader.place(valid_card(&UID_A));
    h.scanner.start().unwrap();
    until(|| h.recorder.len() == 1).await;

    h.reader.place(valid_card(&UID_B));
    until(|| h.recorder.len() == 2).await;
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();

    let verdicts = h.recorder.verdicts();
    assert_eq!(verdicts[1].card_id, "040B0B0B");
}

#[tokio::test]
async fn same_card_is_reported_again_after_cooldown() {
    let h = harness(ScannerConfig {
        cooldown: Duration::from_millis(100),
        ..fast_config()
    });
    h.reader.place(valid_card(&UID_A));
    h.scanner.start().unwrap();
    until(|| h.recorder.len() >= 2).await;
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn bad_cards_are_reported_and_the_loop_keeps_running() {
    let h = harness(fast_config());
    h.reader.place(NullCard::with_raw(&UID_A, b"\x01\x02not json"));
    h.scanner.start().unwrap();
    until(|| h.recorder.len() == 1).await;

    h.reader.place(NullCard::blank(&UID_B));
    until(|| h.recorder.len() == 2).await;

    h.reader.place(NullCard::with_payload(&[9, 9, 9, 9], &json!({"p": "policy"})));
    until(|| h.recorder.len() == 3).await;

    h.reader.place(valid_card(&UID_A));
    until(|| h.recorder.len() == 4).await;
    assert!(h.scanner.is_running());
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();

    let kinds: Vec<_> = h.recorder.verdicts().iter().map(|v| v.error_kind).collect();
    assert_eq!(
        kinds,
        vec![
            Some(ErrorKind::MalformedPayload),
            Some(ErrorKind::EmptyCard),
            Some(ErrorKind::InvalidCardFormat),
            None,
        ]
    );
}

#[tokio::test]
async fn authentication_failure_is_a_verdict() {
    let h = harness(fast_config());
    h.reader.place(valid_card(&UID_A).with_key([0x11; 6]));
    h.scanner.start().unwrap();
    until(|| h.recorder.len() == 1).await;
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();

    let verdict = &h.recorder.verdicts()[0];
    assert!(!verdict.verified);
    assert_eq!(verdict.error_kind, Some(ErrorKind::AuthenticationFailed));
    assert_eq!(h.registry.lookup_count(), 0);
}

#[tokio::test]
async fn disconnect_ends_the_loop() {
    let h = harness(fast_config());
    h.scanner.start().unwrap();
    h.reader.disconnect();

    until(|| !h.scanner.is_running()).await;
    assert!(!h.scanner.reader_connected());
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();
    assert_eq!(h.recorder.len(), 0);
}

#[tokio::test]
async fn stop_is_observed_promptly() {
    let h = harness(ScannerConfig {
        tick: Duration::from_millis(300),
        ..fast_config()
    });
    h.scanner.start().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(400));
    assert!(!h.scanner.is_running());
}

#[tokio::test]
async fn starting_twice_is_rejected() {
    let h = harness(fast_config());
    h.scanner.start().unwrap();
    assert!(matches!(h.scanner.start(), Err(ScannerError::AlreadyRunning)));
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();

    h.scanner.start().unwrap();
    h.scanner.stop(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn wait_for_card_times_out_without_a_card() {
    let h = harness(ScannerConfig::default());

    let started = Instant::now();
    let outcome = h.scanner.wait_for_card(Duration::from_secs(1)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(matches!(outcome, WaitOutcome::NoCardDetected));
    assert!(elapsed >= Duration::from_millis(900), "returned after {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(1500), "returned after {elapsed:?}");
}

#[tokio::test]
async fn wait_for_card_ignores_debounce() {
    let h = harness(fast_config());
    h.reader.place(valid_card(&UID_A));

    for _ in 0..2 {
        match h.scanner.wait_for_card(Duration::from_secs(1)).await.unwrap() {
            WaitOutcome::Verdict(verdict) => assert!(verdict.verified),
            WaitOutcome::NoCardDetected => panic!("card was on the reader"),
        }
    }
    // Single-shot verdicts go to the caller, not to subscribers.
    assert_eq!(h.recorder.len(), 0);
}

#[tokio::test]
async fn wait_for_card_keeps_polling_past_unusable_cards() {
    let h = harness(fast_config());
    h.reader.place(NullCard::blank(&UID_B));

    let reader = h.reader.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        reader.place(valid_card(&UID_A));
    });

    match h.scanner.wait_for_card(Duration::from_secs(2)).await.unwrap() {
        WaitOutcome::Verdict(verdict) => {
            assert!(verdict.verified);
            assert_eq!(verdict.card_id, "04A1B2C3");
        }
        WaitOutcome::NoCardDetected => panic!("card was placed"),
    }
}

#[tokio::test]
async fn wait_for_card_reports_the_unusable_card_on_timeout() {
    let h = harness(fast_config());
    h.reader.place(NullCard::with_payload(&UID_B, &json!({"hello": "world"})));

    match h.scanner.wait_for_card(Duration::from_millis(200)).await.unwrap() {
        WaitOutcome::Verdict(verdict) => {
            assert!(!verdict.verified);
            assert_eq!(verdict.error_kind, Some(ErrorKind::InvalidCardFormat));
        }
        WaitOutcome::NoCardDetected => panic!("a card was seen"),
    }
}

#[tokio::test]
async fn unavailable_registry_is_retried_when_configured() {
    let h = harness(ScannerConfig {
        registry_retries: 2,
        ..fast_config()
    });
    h.registry.fail_next(1);
    h.reader.place(valid_card(&UID_A));

    match h.scanner.wait_for_card(Duration::from_secs(1)).await.unwrap() {
        WaitOutcome::Verdict(verdict) => assert!(verdict.verified),
        WaitOutcome::NoCardDetected => panic!("card was on the reader"),
    }
    assert_eq!(h.registry.lookup_count(), 2);
}

#[tokio::test]
async fn unavailable_registry_without_retries_is_a_verdict() {
    let h = harness(fast_config());
    h.registry.set_unavailable(true);
    h.reader.place(valid_card(&UID_A));

    match h.scanner.wait_for_card(Duration::from_secs(1)).await.unwrap() {
        WaitOutcome::Verdict(verdict) => {
            assert!(!verdict.verified);
            assert_eq!(verdict.error_kind, Some(ErrorKind::RegistryUnavailable));
        }
        WaitOutcome::NoCardDetected => panic!("card was on the reader"),
    }
    assert_eq!(h.registry.lookup_count(), 1);
}

/// Registry whose lookups never answer within a test's lifetime.
#[derive(Default)]
struct StalledRegistry {
    lookups: AtomicUsize,
}

#[async_trait]
impl RegistryLookup for StalledRegistry {
    async fn lookup(
        &self,
        _registry_key: &str,
        _asset_ref: &str,
    ) -> Result<Option<RegistryRecord>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(None)
    }

    async fn is_reachable(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "stalled registry"
    }
}

#[tokio::test]
async fn stop_interrupts_an_in_flight_registry_lookup() {
    let transport = NullTransport::new();
    let reader = transport.reader();
    reader.place(valid_card(&UID_A));
    let registry = Arc::new(StalledRegistry::default());
    let broadcaster = Arc::new(Broadcaster::new());
    let recorder = Arc::new(Recorder::default());
    broadcaster.subscribe(recorder.clone());
    let scanner = Arc::new(Scanner::new(
        Box::new(transport),
        VerificationEngine::new(registry.clone()),
        broadcaster,
        fast_config(),
    ));

    scanner.start().unwrap();
    until(|| registry.lookups.load(Ordering::SeqCst) == 1).await;

    let started = Instant::now();
    scanner.stop(Duration::from_secs(1)).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(300));
    assert!(!scanner.is_running());
    assert_eq!(recorder.len(), 0);
}

/// Wraps a transport and counts calls that begin while another is active.
struct OverlapDetector {
    inner: NullTransport,
    active: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
}

impl OverlapDetector {
    fn guarded<T>(&mut self, f: impl FnOnce(&mut NullTransport) -> T) -> T {
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        std::thread::sleep(Duration::from_millis(1));
        let out = f(&mut self.inner);
        self.active.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

impl CardTransport for OverlapDetector {
    fn detect(&mut self, timeout: Duration) -> Result<Option<CardId>, CardError> {
        self.guarded(|t| t.detect(timeout))
    }

    fn authenticate_block(
        &mut self,
        card: &CardId,
        block: u8,
        key_type: KeyType,
        key: &[u8; 6],
    ) -> Result<bool, CardError> {
        self.guarded(|t| t.authenticate_block(card, block, key_type, key))
    }

    fn read_block(&mut self, block: u8) -> Result<Block, CardError> {
        self.guarded(|t| t.read_block(block))
    }

    fn write_block(&mut self, block: u8, data: &Block) -> Result<bool, CardError> {
        self.guarded(|t| t.write_block(block, data))
    }

    fn name(&self) -> &str {
        "overlap detector"
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn loop_and_single_shot_requests_never_share_the_reader() {
    let inner = NullTransport::new();
    inner.reader().place(valid_card(&UID_A));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let transport = OverlapDetector {
        inner,
        active: Arc::new(AtomicUsize::new(0)),
        overlaps: overlaps.clone(),
    };
    let registry = Arc::new(NullRegistry::new());
    registry.insert(
        "policy",
        "asset",
        RegistryRecord {
            holder_id: "S-001".into(),
            ..RegistryRecord::default()
        },
    );
    let broadcaster = Arc::new(Broadcaster::new());
    let recorder = Arc::new(Recorder::default());
    broadcaster.subscribe(recorder.clone());
    let scanner = Arc::new(Scanner::new(
        Box::new(transport),
        VerificationEngine::new(registry),
        broadcaster,
        ScannerConfig {
            cooldown: Duration::ZERO,
            tick: Duration::from_millis(1),
            ..fast_config()
        },
    ));

    scanner.start().unwrap();
    let requests: Vec<_> = (0..4)
        .map(|_| {
            let scanner = scanner.clone();
            tokio::spawn(async move {
                for _ in 0..5 {
                    let outcome = scanner.wait_for_card(Duration::from_secs(2)).await.unwrap();
                    assert!(matches!(outcome, WaitOutcome::Verdict(v) if v.verified));
                }
            })
        })
        .collect();
    for request in requests {
        request.await.unwrap();
    }
    scanner.stop(Duration::from_secs(1)).await.unwrap();

    assert!(recorder.len() > 0);
    assert_eq!(overlaps.load(Ordering::SeqCst), 0);
}
