pub mod config;
pub mod models;
pub mod db;
pub mod pipeline; // ID decoding, extraction, structuring, OCR, orchestration

pub use pipeline::processor::{DocumentProcessor, ProcessingError, ProcessingOutcome};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// Honors `RUST_LOG` when set, otherwise falls back to
/// [`config::default_log_filter`]. Safe to call more than once: later calls
/// are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("Medcert v{} logging initialized", config::APP_VERSION);
}
