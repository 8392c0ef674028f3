//! Background anchoring.
//!
//! Periodically collects events past the last anchored sequence and groups
//! them into fixed-size batches. The scheduler is an operational
//! convenience, not part of the security core: it only drives the same
//! public `create_batch` / `prove_event` surface any caller could use, and
//! stamps the resulting batch id and proof onto each event row as the
//! informational convenience fields.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use attesta_contracts::LedgerResult;
use attesta_store::EventStore;

use crate::batch::{AnchorBatch, AnchorService};

/// Scheduler configuration, environment-keyed.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Events per batch.
    pub batch_size: usize,
    /// Pause between anchoring passes.
    pub interval: Duration,
    /// Master switch; disabled by default.
    pub enabled: bool,
    /// Minimum unanchored events before a pass creates anything.
    pub min_events: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        AnchorConfig {
            batch_size: 100,
            interval: Duration::from_secs(3600),
            enabled: false,
            min_events: 1,
        }
    }
}

impl AnchorConfig {
    /// Read `ANCHOR_BATCH_SIZE`, `ANCHOR_INTERVAL_SECONDS`, `ANCHOR_ENABLED`,
    /// and `ANCHOR_MIN_EVENTS`.
    pub fn from_env() -> AnchorConfig {
        let defaults = AnchorConfig::default();
        AnchorConfig {
            batch_size: env_parse("ANCHOR_BATCH_SIZE", defaults.batch_size),
            interval: Duration::from_secs(env_parse(
                "ANCHOR_INTERVAL_SECONDS",
                defaults.interval.as_secs(),
            )),
            enabled: std::env::var("ANCHOR_ENABLED")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.enabled),
            min_events: env_parse("ANCHOR_MIN_EVENTS", defaults.min_events),
        }
    }
}

/// Periodically anchors unanchored events in the background.
pub struct AnchorScheduler {
    store: Arc<dyn EventStore>,
    anchor: Arc<AnchorService>,
    config: AnchorConfig,
    worker: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

impl AnchorScheduler {
    pub fn new(
        store: Arc<dyn EventStore>,
        anchor: Arc<AnchorService>,
        config: AnchorConfig,
    ) -> AnchorScheduler {
        AnchorScheduler {
            store,
            anchor,
            config,
            worker: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    pub fn anchor_service(&self) -> &Arc<AnchorService> {
        &self.anchor
    }

    /// Start the background thread. A no-op when disabled or already
    /// running.
    pub fn start(&mut self) {
        if !self.config.enabled {
            info!("anchor scheduler disabled (set ANCHOR_ENABLED=1 to enable)");
            return;
        }
        if self.worker.is_some() {
            return;
        }

        let (tx, rx) = mpsc::channel::<()>();
        let store = Arc::clone(&self.store);
        let anchor = Arc::clone(&self.anchor);
        let config = self.config.clone();

        let handle = std::thread::spawn(move || loop {
            match rx.recv_timeout(config.interval) {
                // A message or a hung-up sender both mean: stop.
                Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    if let Err(e) = run_anchoring_pass(store.as_ref(), &anchor, &config) {
                        error!(error = %e, "anchoring pass failed");
                    }
                }
            }
        });

        info!(
            batch_size = self.config.batch_size,
            interval_seconds = self.config.interval.as_secs(),
            "anchor scheduler started"
        );
        self.worker = Some((tx, handle));
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(&mut self) {
        if let Some((tx, handle)) = self.worker.take() {
            let _ = tx.send(());
            if handle.join().is_err() {
                warn!("anchor scheduler thread panicked during shutdown");
            }
            info!("anchor scheduler stopped");
        }
    }

    /// Run one anchoring pass synchronously (also what the thread does on
    /// each tick).
    pub fn create_pending_batches(&self) -> LedgerResult<Vec<AnchorBatch>> {
        run_anchoring_pass(self.store.as_ref(), &self.anchor, &self.config)
    }
}

impl Drop for AnchorScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Anchor every event past the last anchored sequence, in batch-size
/// chunks, then stamp each event row with its batch id and proof.
fn run_anchoring_pass(
    store: &dyn EventStore,
    anchor: &AnchorService,
    config: &AnchorConfig,
) -> LedgerResult<Vec<AnchorBatch>> {
    let last_anchored = anchor.last_anchored_sequence();
    let events = store.list_all()?;
    let pending: Vec<_> = events
        .iter()
        .filter(|e| e.sequence_number > last_anchored)
        .collect();

    if pending.len() < config.min_events {
        return Ok(Vec::new());
    }

    let mut created = Vec::new();
    for chunk in pending.chunks(config.batch_size.max(1)) {
        let event_ids: Vec<Uuid> = chunk.iter().map(|e| e.event_id).collect();
        let event_hashes: Vec<String> = chunk.iter().map(|e| e.event_hash.clone()).collect();
        let batch = anchor.create_batch(
            event_ids,
            event_hashes,
            chunk[0].sequence_number,
            chunk[chunk.len() - 1].sequence_number,
        )?;

        for event in chunk {
            if let Some(result) = anchor.prove_event(event.event_id) {
                if let Some(proof) = result.proof {
                    store.set_anchor_fields(event.event_id, batch.batch_id, &proof)?;
                }
            }
        }
        created.push(batch);
    }

    info!(
        batches = created.len(),
        through_sequence = pending.last().map(|e| e.sequence_number).unwrap_or(last_anchored),
        "anchoring pass complete"
    );
    Ok(created)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
