pub mod config;
pub mod engine;
pub mod error;
pub mod record;
pub mod session;
pub mod transaction;

use crate::config::IngestConfig;
use crate::engine::ingest::{IngestHandle, StreamingCsvIngestor};
use crate::engine::source::CsvFileSource;
use std::path::Path;

/// Starts streaming `path` through normalization and validation.
///
/// Returns immediately; snapshots arrive through the handle.
pub fn stream_records(path: impl AsRef<Path>, config: IngestConfig) -> IngestHandle {
    StreamingCsvIngestor::new(config).ingest(CsvFileSource::new(path.as_ref()))
}
