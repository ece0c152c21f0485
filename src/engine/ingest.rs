//! Streaming CSV ingestion.
//!
//! An ingestion first parses on a blocking worker thread. If that attempt
//! fails, or produces no row before the watchdog fires, it is abandoned and
//! the file is parsed again from the top, inline on the ingest task. The
//! retry policy lives in [`IngestState`] so it can be exercised without a
//! parser.

use crate::config::IngestConfig;
use crate::engine::normalize::HeaderNormalizer;
use crate::engine::source::{ExecutionMode, RowSource};
use crate::engine::validate::validate;
use crate::error::IngestError;
use crate::record::{ParsedRecord, RawRow};

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const EVENT_CHANNEL_CAPACITY: usize = 16;
const ROW_CHANNEL_CAPACITY: usize = 1024;

/// How a single parse attempt ended.
#[derive(Debug)]
pub enum AttemptOutcome {
    Completed,
    Stalled(Duration),
    BackendError(IngestError),
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Completed => f.write_str("completed"),
            AttemptOutcome::Stalled(timeout) => write!(f, "{}", IngestError::Stalled(*timeout)),
            AttemptOutcome::BackendError(err) => write!(f, "{}", err),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestState {
    Starting(ExecutionMode),
    Restarting(ExecutionMode),
    Completed,
    Failed(String),
}

impl IngestState {
    pub fn initial() -> Self {
        IngestState::Starting(ExecutionMode::Concurrent)
    }

    /// The mode of the attempt to run next, if any.
    pub fn mode(&self) -> Option<ExecutionMode> {
        match self {
            IngestState::Starting(mode) | IngestState::Restarting(mode) => Some(*mode),
            IngestState::Completed | IngestState::Failed(_) => None,
        }
    }

    /// Only a failed first concurrent attempt earns a restart.
    pub fn advance(self, outcome: &AttemptOutcome) -> IngestState {
        match (self, outcome) {
            (terminal @ (IngestState::Completed | IngestState::Failed(_)), _) => terminal,
            (_, AttemptOutcome::Completed) => IngestState::Completed,
            (IngestState::Starting(ExecutionMode::Concurrent), _) => {
                IngestState::Restarting(ExecutionMode::Sequential)
            }
            (_, failure) => IngestState::Failed(failure.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Completed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// The full accumulator at this point; replaces any earlier snapshot.
    Batch(Vec<ParsedRecord>),
    /// No further events follow.
    Done(IngestOutcome),
}

/// Receiver side of a running ingestion.
///
/// Dropping the handle cancels the ingestion.
pub struct IngestHandle {
    events: mpsc::Receiver<IngestEvent>,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl IngestHandle {
    /// Next snapshot or completion notice. Returns `None` once the ingestion
    /// has finished and every event was taken, or after [`cancel`](Self::cancel).
    pub async fn next_event(&mut self) -> Option<IngestEvent> {
        if self.is_cancelled() {
            return None;
        }
        let event = self.events.recv().await?;
        if self.is_cancelled() {
            return None;
        }
        Some(event)
    }

    /// Stops the ingestion. Safe to call repeatedly and after completion.
    pub fn cancel(&self) {
        let already = self.cancelled.swap(true, Ordering::AcqRel);
        if !already && !self.task.is_finished() {
            tracing::debug!("ingestion cancelled");
        }
        self.task.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Drains the ingestion, returning the last snapshot and how it ended.
    /// Returns `None` if the ingestion was cancelled first.
    pub async fn finish(mut self) -> Option<(Vec<ParsedRecord>, IngestOutcome)> {
        let mut records = Vec::new();
        while let Some(event) = self.next_event().await {
            match event {
                IngestEvent::Batch(snapshot) => records = snapshot,
                IngestEvent::Done(outcome) => return Some((records, outcome)),
            }
        }
        None
    }
}

impl Drop for IngestHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub struct StreamingCsvIngestor {
    config: IngestConfig,
}

impl StreamingCsvIngestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Starts ingesting `source` on a new tokio task and returns at once.
    ///
    /// Must be called from within a tokio runtime.
    pub fn ingest<S: RowSource>(&self, source: S) -> IngestHandle {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let cancelled = Arc::new(AtomicBool::new(false));

        let pipeline = Pipeline {
            normalizer: HeaderNormalizer::new(self.config.header_mode()),
            config: self.config.clone(),
            source: Arc::new(source),
            events: events.clone(),
            cancelled: Arc::clone(&cancelled),
        };
        let task = tokio::spawn(supervise(pipeline, events));

        IngestHandle {
            events: rx,
            cancelled,
            task,
        }
    }
}

impl Default for StreamingCsvIngestor {
    fn default() -> Self {
        Self::new(IngestConfig::default())
    }
}

/// The consumer went away; stop without reporting.
#[derive(Debug)]
struct ConsumerGone;

enum WorkerMessage {
    Row(RawRow),
    Failed(IngestError),
    Finished,
}

/// Runs the pipeline on its own task. A panic there still ends the ingestion
/// with `Done(Failed)`; the last snapshot sent stands.
async fn supervise(pipeline: Pipeline, events: mpsc::Sender<IngestEvent>) {
    let mut run = AbortTaskOnDrop(tokio::spawn(pipeline.run()));
    let Err(err) = (&mut run.0).await else {
        return;
    };
    if !err.is_panic() {
        return;
    }

    let reason = IngestError::TaskFailed(err.to_string()).to_string();
    tracing::error!(%reason, "ingestion task failed");
    let _ = events
        .send(IngestEvent::Done(IngestOutcome::Failed(reason)))
        .await;
}

/// Aborts the pipeline task when its supervisor is aborted.
struct AbortTaskOnDrop(JoinHandle<()>);

impl Drop for AbortTaskOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Tells the worker thread to stop once the attempt is dropped.
struct AbortOnDrop(Arc<AtomicBool>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

struct Accumulator<'a> {
    records: Vec<ParsedRecord>,
    normalizer: &'a HeaderNormalizer,
    config: &'a IngestConfig,
}

impl<'a> Accumulator<'a> {
    fn new(normalizer: &'a HeaderNormalizer, config: &'a IngestConfig) -> Self {
        Self {
            records: Vec::new(),
            normalizer,
            config,
        }
    }

    /// Validates and appends one row. Returns whether a snapshot is due.
    fn push(&mut self, row: RawRow) -> bool {
        self.records.push(validate(self.normalizer.normalize(row)));
        let n = self.records.len();
        let first = self.config.first_batch_size();
        n == first || (n > first && n % self.config.batch_size() == 0)
    }

    fn snapshot(&self) -> IngestEvent {
        IngestEvent::Batch(self.records.clone())
    }
}

struct Pipeline {
    normalizer: HeaderNormalizer,
    config: IngestConfig,
    source: Arc<dyn RowSource>,
    events: mpsc::Sender<IngestEvent>,
    cancelled: Arc<AtomicBool>,
}

impl Pipeline {
    async fn run(self) {
        let description = self.source.describe();
        tracing::info!(source = %description, "ingestion started");

        let mut state = IngestState::initial();
        let mut acc = Accumulator::new(&self.normalizer, &self.config);

        let outcome = loop {
            let mode = match &state {
                IngestState::Starting(mode) => *mode,
                IngestState::Restarting(mode) => {
                    tracing::warn!(?mode, "restarting ingestion from the first row");
                    *mode
                }
                IngestState::Completed => break IngestOutcome::Completed,
                IngestState::Failed(reason) => break IngestOutcome::Failed(reason.clone()),
            };

            acc.records.clear();
            let attempt = match mode {
                ExecutionMode::Concurrent => self.run_concurrent(&mut acc).await,
                ExecutionMode::Sequential => self.run_sequential(&mut acc).await,
            };
            let Ok(attempt) = attempt else {
                tracing::debug!("consumer gone; stopping ingestion");
                return;
            };

            if !matches!(attempt, AttemptOutcome::Completed) {
                tracing::warn!(?mode, rows = acc.records.len(), reason = %attempt, "parse attempt failed");
            }
            state = state.advance(&attempt);
        };

        let valid = acc.records.iter().filter(|r| r.is_valid).count();
        match &outcome {
            IngestOutcome::Completed => tracing::info!(
                source = %description,
                rows = acc.records.len(),
                valid,
                invalid = acc.records.len() - valid,
                "ingestion completed"
            ),
            IngestOutcome::Failed(reason) => tracing::error!(
                source = %description,
                rows = acc.records.len(),
                %reason,
                "ingestion failed"
            ),
        }

        if self.emit(acc.snapshot()).await.is_err() {
            return;
        }
        let _ = self.emit(IngestEvent::Done(outcome)).await;
    }

    async fn emit(&self, event: IngestEvent) -> Result<(), ConsumerGone> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(ConsumerGone);
        }
        self.events.send(event).await.map_err(|_| ConsumerGone)
    }

    async fn run_concurrent(&self, acc: &mut Accumulator<'_>) -> Result<AttemptOutcome, ConsumerGone> {
        let (row_tx, mut row_rx) = mpsc::channel(ROW_CHANNEL_CAPACITY);
        let abort = Arc::new(AtomicBool::new(false));
        let _guard = AbortOnDrop(Arc::clone(&abort));

        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || parse_worker(source.as_ref(), row_tx, &abort));

        let timeout = self.config.watchdog_timeout();
        let watchdog = tokio::time::sleep(timeout);
        tokio::pin!(watchdog);
        let mut progressed = 0usize;

        loop {
            tokio::select! {
                biased;

                message = row_rx.recv() => match message {
                    Some(WorkerMessage::Row(row)) => {
                        progressed += 1;
                        if acc.push(row) {
                            self.emit(acc.snapshot()).await?;
                        }
                    }
                    Some(WorkerMessage::Failed(err)) => return Ok(AttemptOutcome::BackendError(err)),
                    Some(WorkerMessage::Finished) => return Ok(AttemptOutcome::Completed),
                    None => return Ok(AttemptOutcome::BackendError(IngestError::WorkerLost)),
                },
                _ = &mut watchdog, if progressed == 0 => {
                    return Ok(AttemptOutcome::Stalled(timeout));
                }
            }
        }
    }

    async fn run_sequential(&self, acc: &mut Accumulator<'_>) -> Result<AttemptOutcome, ConsumerGone> {
        let stream = match self.source.open(ExecutionMode::Sequential) {
            Ok(stream) => stream,
            Err(err) => return Ok(AttemptOutcome::BackendError(err)),
        };

        for item in stream {
            if self.cancelled.load(Ordering::Acquire) {
                return Err(ConsumerGone);
            }
            match item {
                Ok(row) => {
                    if acc.push(row) {
                        self.emit(acc.snapshot()).await?;
                        tokio::task::yield_now().await;
                    }
                }
                Err(err) => return Ok(AttemptOutcome::BackendError(err)),
            }
        }
        Ok(AttemptOutcome::Completed)
    }
}

/// Body of the concurrent attempt's worker thread.
fn parse_worker(source: &dyn RowSource, rows: mpsc::Sender<WorkerMessage>, abort: &AtomicBool) {
    let stream = match source.open(ExecutionMode::Concurrent) {
        Ok(stream) => stream,
        Err(err) => {
            let _ = rows.blocking_send(WorkerMessage::Failed(err));
            return;
        }
    };

    for item in stream {
        if abort.load(Ordering::Acquire) {
            return;
        }
        let message = match item {
            Ok(row) => WorkerMessage::Row(row),
            Err(err) => {
                let _ = rows.blocking_send(WorkerMessage::Failed(err));
                return;
            }
        };
        if rows.blocking_send(message).is_err() {
            return;
        }
    }
    let _ = rows.blocking_send(WorkerMessage::Finished);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend_error() -> AttemptOutcome {
        AttemptOutcome::BackendError(IngestError::Backend("worker failed".to_string()))
    }

    #[test]
    fn test_concurrent_success_completes() {
        let state = IngestState::initial().advance(&AttemptOutcome::Completed);
        assert_eq!(state, IngestState::Completed);
    }

    #[test]
    fn test_concurrent_failure_restarts_sequential() {
        let state = IngestState::initial().advance(&backend_error());
        assert_eq!(state, IngestState::Restarting(ExecutionMode::Sequential));
        assert_eq!(state.mode(), Some(ExecutionMode::Sequential));
    }

    #[test]
    fn test_stall_is_treated_like_failure() {
        let state = IngestState::initial().advance(&AttemptOutcome::Stalled(Duration::from_millis(5000)));
        assert_eq!(state, IngestState::Restarting(ExecutionMode::Sequential));
    }

    #[test]
    fn test_only_one_restart() {
        let state = IngestState::initial()
            .advance(&backend_error())
            .advance(&backend_error());
        assert_eq!(
            state,
            IngestState::Failed("Parser backend failed: worker failed".to_string())
        );
        assert_eq!(state.mode(), None);
    }

    #[test]
    fn test_sequential_start_fails_without_restart() {
        let state = IngestState::Starting(ExecutionMode::Sequential).advance(&backend_error());
        assert!(matches!(state, IngestState::Failed(_)));
    }

    #[test]
    fn test_restart_then_success_completes() {
        let state = IngestState::initial()
            .advance(&AttemptOutcome::Stalled(Duration::from_secs(5)))
            .advance(&AttemptOutcome::Completed);
        assert_eq!(state, IngestState::Completed);
    }

    #[test]
    fn test_terminal_states_absorb() {
        assert_eq!(
            IngestState::Completed.advance(&backend_error()),
            IngestState::Completed
        );
        let failed = IngestState::Failed("x".to_string());
        assert_eq!(failed.clone().advance(&AttemptOutcome::Completed), failed);
    }
}
