use crate::engine::ingest::IngestEvent;
use crate::engine::summary::{summarize, SummaryStatistics};
use crate::record::ParsedRecord;
use crate::transaction::{to_transactions, Transaction};

use std::path::{Path, PathBuf};

/// In-memory state of one batch upload: who submits it, which file it came
/// from, and the latest record snapshot.
#[derive(Debug, Clone, Default)]
pub struct BatchSession {
    batch_name: String,
    approver: String,
    file: Option<PathBuf>,
    records: Vec<ParsedRecord>,
}

impl BatchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the batch details. Choosing a different file discards the
    /// records parsed from the previous one.
    pub fn set_details(&mut self, batch_name: &str, approver: &str, file: Option<PathBuf>) {
        if self.file != file {
            self.records.clear();
        }
        self.batch_name = batch_name.to_string();
        self.approver = approver.to_string();
        self.file = file;
    }

    pub fn batch_name(&self) -> &str {
        &self.batch_name
    }

    pub fn approver(&self) -> &str {
        &self.approver
    }

    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub fn set_records(&mut self, records: Vec<ParsedRecord>) {
        self.records = records;
    }

    /// Applies an ingestion event. Returns `true` once ingestion is done.
    pub fn apply(&mut self, event: IngestEvent) -> bool {
        match event {
            IngestEvent::Batch(snapshot) => {
                self.set_records(snapshot);
                false
            }
            IngestEvent::Done(_) => true,
        }
    }

    pub fn records(&self) -> &[ParsedRecord] {
        &self.records
    }

    pub fn valid_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_valid).count()
    }

    pub fn invalid_count(&self) -> usize {
        self.records.len() - self.valid_count()
    }

    /// The rows to show for review with their 1-based row numbers,
    /// optionally only the invalid ones.
    pub fn review_rows(&self, only_invalid: bool) -> Vec<(usize, &ParsedRecord)> {
        self.records
            .iter()
            .enumerate()
            .filter(|(_, r)| !only_invalid || !r.is_valid)
            .map(|(i, r)| (i + 1, r))
            .collect()
    }

    pub fn summary(&self) -> SummaryStatistics {
        summarize(&self.records)
    }

    pub fn can_submit(&self) -> bool {
        self.records.iter().any(|r| r.is_valid)
    }

    /// Hands back the valid records as transactions and resets the session.
    pub fn submit(&mut self, created_at_millis: i64) -> Vec<Transaction> {
        let transactions = to_transactions(
            &self.records,
            &self.batch_name,
            &self.approver,
            created_at_millis,
        );
        self.reset();
        transactions
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ingest::IngestOutcome;
    use crate::engine::normalize::HeaderNormalizer;
    use crate::engine::validate::validate;
    use crate::record::RawRow;

    fn record(date: &str, amount: &str) -> ParsedRecord {
        let raw: RawRow = [
            ("Transaction Date", date),
            ("Account Number", "000-123456789-01"),
            ("Account Holder Name", "Alice"),
            ("Amount", amount),
        ]
        .into_iter()
        .collect();
        validate(HeaderNormalizer::default().normalize(raw))
    }

    fn loaded_session() -> BatchSession {
        let mut session = BatchSession::new();
        session.set_details("payroll", "jane", Some(PathBuf::from("a.csv")));
        session.apply(IngestEvent::Batch(vec![
            record("2025-01-01", "100"),
            record("2025-04-31", "50"),
            record("2025-01-02", "250.5"),
        ]));
        session
    }

    #[test]
    fn test_counts_partition_records() {
        let session = loaded_session();
        assert_eq!(session.valid_count(), 2);
        assert_eq!(session.invalid_count(), 1);
    }

    #[test]
    fn test_only_invalid_view_does_not_mutate() {
        let session = loaded_session();
        let invalid = session.review_rows(true);

        assert_eq!(invalid.len(), 1);
        assert_eq!(invalid[0].0, 2);
        assert!(!invalid[0].1.is_valid);
        assert_eq!(session.review_rows(false).len(), 3);
        assert_eq!(session.records().len(), 3);
    }

    #[test]
    fn test_new_file_discards_records() {
        let mut session = loaded_session();

        session.set_details("payroll v2", "jane", Some(PathBuf::from("a.csv")));
        assert_eq!(session.records().len(), 3);

        session.set_details("payroll v2", "jane", Some(PathBuf::from("b.csv")));
        assert!(session.records().is_empty());
    }

    #[test]
    fn test_done_event_reports_completion() {
        let mut session = loaded_session();
        assert!(session.apply(IngestEvent::Done(IngestOutcome::Completed)));
        assert_eq!(session.records().len(), 3);
    }

    #[test]
    fn test_submit_converts_valid_and_resets() {
        let mut session = loaded_session();
        assert!(session.can_submit());
        assert_eq!(session.summary().number_of_payments, 2);

        let txs = session.submit(42);
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].batch_name, "payroll");
        assert_eq!(txs[0].approver, "jane");

        assert!(session.records().is_empty());
        assert_eq!(session.batch_name(), "");
        assert!(session.file().is_none());
        assert!(!session.can_submit());
    }
}
