//! Checkpoint: RFID tag validation for vehicle passes.
//!
//! Library crate shared by the `checkpoint` binary and the integration
//! tests in `tests/`.

use std::sync::Arc;

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod sink;
pub mod store;

use middleware::audit::ScanRecorder;
use middleware::validate::PassLookup;

/// Shared application state passed to handlers.
pub struct AppState {
    pub passes: Arc<dyn PassLookup>,
    pub recorder: ScanRecorder,
    pub config: config::Config,
}
