//! Scan log sinks.
//!
//! A sink is an append-only document store: it takes one structured scan
//! document, assigns it a key, and never reads it back. Backends:
//!   - `FirebaseSink`: pushes to a Firebase realtime-database path over REST.
//!   - `PgScanSink`: inserts into the `rfid_scan_logs` JSONB table.
//!   - `NullSink`: discards (for `CHECKPOINT_SCAN_SINK=none`).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::config::{Config, SinkKind};

pub mod firebase;
pub mod postgres;

pub use firebase::FirebaseSink;
pub use postgres::PgScanSink;

#[async_trait]
pub trait ScanSink: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Append `document` and return the key the store assigned to it.
    async fn push(&self, document: &Value) -> anyhow::Result<String>;

    /// Release backend resources. Called once at shutdown.
    async fn close(&self) {}
}

pub struct NullSink;

#[async_trait]
impl ScanSink for NullSink {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn push(&self, _document: &Value) -> anyhow::Result<String> {
        Ok(Uuid::new_v4().to_string())
    }
}

/// Open the sink selected by configuration.
pub fn open(cfg: &Config, pool: sqlx::PgPool) -> anyhow::Result<Arc<dyn ScanSink>> {
    let sink: Arc<dyn ScanSink> = match cfg.scan_sink {
        SinkKind::Firebase => {
            let firebase = cfg
                .firebase
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("firebase sink selected but FIREBASE_DATABASE_URL is not set"))?;
            Arc::new(FirebaseSink::open(firebase, cfg.sink_timeout)?)
        }
        SinkKind::Postgres => Arc::new(PgScanSink::new(pool)),
        SinkKind::None => Arc::new(NullSink),
    };
    tracing::info!(sink = sink.name(), "scan log sink opened");
    Ok(sink)
}
