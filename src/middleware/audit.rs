//! Scan recorder: turns validation outcomes into scan log entries and
//! hands them to the configured sink.
//!
//! Recording is best-effort. Sink errors (and panics) are logged, counted,
//! and swallowed; nothing here can change a status code the handler has
//! already decided.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::{JoinHandle, JoinSet};

use crate::config::RecordMode;
use crate::middleware::metrics::ScanMetrics;
use crate::models::scan::{ScanLogEntry, ScanTiming, ValidationOutcome};
use crate::sink::ScanSink;

/// How long shutdown waits for the queue to drain.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ScanRecorder {
    sink: Arc<dyn ScanSink>,
    metrics: Arc<ScanMetrics>,
    queue: Option<Queue>,
}

struct Queue {
    tx: RwLock<Option<mpsc::Sender<ScanLogEntry>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl ScanRecorder {
    /// Start a recorder over an already-opened sink. In detached mode this
    /// spawns the background writer, so it must run inside a Tokio runtime.
    pub fn start(sink: Arc<dyn ScanSink>, mode: RecordMode, metrics: Arc<ScanMetrics>) -> Self {
        let queue = match mode {
            RecordMode::Sync => None,
            RecordMode::Detached { capacity } => {
                let (tx, rx) = mpsc::channel(capacity);
                let writer = tokio::spawn(drain(rx, sink.clone(), metrics.clone()));
                Some(Queue {
                    tx: RwLock::new(Some(tx)),
                    writer: Mutex::new(Some(writer)),
                })
            }
        };

        tracing::info!(sink = sink.name(), ?mode, "scan recorder started");
        Self {
            sink,
            metrics,
            queue,
        }
    }

    pub fn metrics(&self) -> &ScanMetrics {
        &self.metrics
    }

    /// Record one validation outcome. Never fails.
    pub async fn record(&self, outcome: &ValidationOutcome, tag_id: &str, timing: ScanTiming) {
        self.submit(ScanLogEntry::from_outcome(outcome, tag_id, &timing))
            .await;
    }

    /// Record a scan that ended in an infrastructure fault. Never fails.
    pub async fn record_fault(&self, tag_id: &str, message: &str, timing: ScanTiming) {
        self.submit(ScanLogEntry::from_fault(tag_id, message, &timing))
            .await;
    }

    async fn submit(&self, entry: ScanLogEntry) {
        let Some(queue) = &self.queue else {
            write_guarded(self.sink.clone(), self.metrics.clone(), entry).await;
            return;
        };

        let tx = queue.tx.read().await;
        let Some(tx) = tx.as_ref() else {
            self.metrics.log_dropped();
            tracing::warn!(scan_id = %entry.scan_id, "scan recorder is shut down, dropping entry");
            return;
        };

        match tx.try_send(entry) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(entry)) => {
                self.metrics.log_dropped();
                tracing::warn!(
                    scan_id = %entry.scan_id,
                    tag = %entry.tag_id,
                    "scan log queue full, dropping entry"
                );
            }
            Err(mpsc::error::TrySendError::Closed(entry)) => {
                self.metrics.log_dropped();
                tracing::error!(scan_id = %entry.scan_id, "scan log writer has stopped, dropping entry");
            }
        }
    }

    /// Stop accepting entries, drain what is queued, then close the sink.
    /// Safe to call more than once.
    pub async fn shutdown(&self) {
        self.shutdown_within(DRAIN_TIMEOUT).await;
    }

    /// Like `shutdown`, but gives up on the queue after `drain_timeout`.
    /// The writer and its in-flight write are aborted before the sink closes.
    pub async fn shutdown_within(&self, drain_timeout: Duration) {
        if let Some(queue) = &self.queue {
            queue.tx.write().await.take();
            if let Some(mut writer) = queue.writer.lock().await.take() {
                if tokio::time::timeout(drain_timeout, &mut writer).await.is_err() {
                    writer.abort();
                    tracing::warn!(
                        timeout = ?drain_timeout,
                        "scan log queue did not drain in time, abandoning unwritten entries"
                    );
                }
            }
        }
        self.sink.close().await;
        tracing::info!(
            sink = self.sink.name(),
            failures = self.metrics.log_failures(),
            dropped = self.metrics.dropped(),
            "scan recorder stopped"
        );
    }
}

async fn drain(
    mut rx: mpsc::Receiver<ScanLogEntry>,
    sink: Arc<dyn ScanSink>,
    metrics: Arc<ScanMetrics>,
) {
    // Aborting the writer drops this set, which cancels the write in flight.
    let mut in_flight = JoinSet::new();
    while let Some(entry) = rx.recv().await {
        let scan_id = entry.scan_id.clone();
        let (sink, metrics) = (sink.clone(), metrics.clone());
        in_flight.spawn(async move { write(sink.as_ref(), &metrics, &entry).await });
        if let Some(Err(e)) = in_flight.join_next().await {
            tracing::error!(scan_id = %scan_id, "scan log write task failed: {}", e);
        }
    }
    tracing::debug!("scan log writer drained");
}

/// Write on a separate task so a panicking sink, or a caller that goes
/// away mid-write, cannot unwind into the request path.
async fn write_guarded(sink: Arc<dyn ScanSink>, metrics: Arc<ScanMetrics>, entry: ScanLogEntry) {
    let scan_id = entry.scan_id.clone();
    let task = tokio::spawn(async move { write(sink.as_ref(), &metrics, &entry).await });
    if let Err(e) = task.await {
        tracing::error!(scan_id = %scan_id, "scan log write task failed: {}", e);
    }
}

async fn write(sink: &dyn ScanSink, metrics: &ScanMetrics, entry: &ScanLogEntry) {
    let document = entry.to_document();
    match sink.push(&document).await {
        Ok(key) => {
            tracing::debug!(
                scan_id = %entry.scan_id,
                key = %key,
                sink = sink.name(),
                "scan log recorded"
            );
        }
        Err(e) => {
            metrics.log_failed();
            tracing::error!(
                scan_id = %entry.scan_id,
                tag = %entry.tag_id,
                sink = sink.name(),
                "failed to write scan log: {:#}",
                e
            );
        }
    }
}
