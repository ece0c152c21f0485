use std::time::Duration;

/// Which header spellings the normalizer recognises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeaderMode {
    /// Only the canonical headers, compared ignoring case and whitespace.
    #[default]
    Strict,
    /// Canonical headers plus a few common synonyms.
    Permissive,
}

#[derive(Debug, Clone)]
pub struct IngestConfig {
    header_mode: HeaderMode,
    /// Rows before the first snapshot is emitted.
    first_batch_size: usize,
    /// Snapshot interval after the first one.
    batch_size: usize,
    /// How long the concurrent attempt may go without a single row.
    watchdog_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            header_mode: HeaderMode::Strict,
            first_batch_size: 1,
            batch_size: 1000,
            watchdog_timeout: Duration::from_millis(5000),
        }
    }
}

impl IngestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header_mode(&self) -> HeaderMode {
        self.header_mode
    }

    pub fn first_batch_size(&self) -> usize {
        self.first_batch_size
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn watchdog_timeout(&self) -> Duration {
        self.watchdog_timeout
    }

    pub fn with_header_mode(mut self, mode: HeaderMode) -> Self {
        self.header_mode = mode;
        self
    }

    pub fn with_first_batch_size(mut self, size: usize) -> Self {
        self.first_batch_size = size.max(1);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    pub fn with_watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = timeout;
        self
    }
}
