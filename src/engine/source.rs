use crate::error::IngestError;
use crate::record::RawRow;

use csv::ReaderBuilder;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;

/// How a parse attempt is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Parsing runs on a blocking worker thread off the ingest task.
    Concurrent,
    /// Parsing runs inline on the ingest task.
    Sequential,
}

pub type RowStream = Box<dyn Iterator<Item = Result<RawRow, IngestError>> + Send>;

/// A parsing backend producing raw rows from the top of a file.
///
/// Every call to `open` starts over from the first data row. The mode is
/// passed through so a backend may behave differently per execution mode.
pub trait RowSource: Send + Sync + 'static {
    fn open(&self, mode: ExecutionMode) -> Result<RowStream, IngestError>;

    fn describe(&self) -> String {
        "csv".to_string()
    }
}

/// Reads a CSV file from disk. The header row is required; blank lines are
/// skipped and values are kept exactly as written.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RowSource for CsvFileSource {
    fn open(&self, _mode: ExecutionMode) -> Result<RowStream, IngestError> {
        let file = File::open(&self.path).map_err(|source| IngestError::Open {
            path: self.path.clone(),
            source,
        })?;
        csv_rows(file)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// CSV content already held in memory.
#[derive(Debug, Clone)]
pub struct CsvBytesSource {
    bytes: Vec<u8>,
}

impl CsvBytesSource {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl RowSource for CsvBytesSource {
    fn open(&self, _mode: ExecutionMode) -> Result<RowStream, IngestError> {
        csv_rows(Cursor::new(self.bytes.clone()))
    }

    fn describe(&self) -> String {
        format!("<{} bytes in memory>", self.bytes.len())
    }
}

fn csv_rows<R: Read + Send + 'static>(reader: R) -> Result<RowStream, IngestError> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    Ok(Box::new(rdr.into_records().map(move |result| {
        let record = result?;
        let mut row = RawRow::new();
        // Short rows leave trailing columns absent; surplus values are dropped.
        for (header, value) in headers.iter().zip(record.iter()) {
            if !row.contains_key(header) {
                row.insert(header, value);
            }
        }
        Ok(row)
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FieldValue;

    fn collect(source: &dyn RowSource) -> Vec<RawRow> {
        source
            .open(ExecutionMode::Sequential)
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let source = CsvBytesSource::new("a,b\n1,2\n\n\n3,4\n");
        let rows = collect(&source);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("a"), Some(&FieldValue::from("3")));
    }

    #[test]
    fn test_values_are_not_trimmed() {
        let source = CsvBytesSource::new("Amount\n\" 123.45 \"\n");
        let rows = collect(&source);

        assert_eq!(rows[0].get("Amount"), Some(&FieldValue::from(" 123.45 ")));
    }

    #[test]
    fn test_short_rows_leave_columns_absent() {
        let source = CsvBytesSource::new("a,b,c\n1,2\n");
        let rows = collect(&source);

        assert_eq!(rows[0].len(), 2);
        assert!(!rows[0].contains_key("c"));
    }

    #[test]
    fn test_header_only_yields_no_rows() {
        let source = CsvBytesSource::new("Transaction Date,Account Number,Account Holder Name,Amount\n");
        assert!(collect(&source).is_empty());
    }

    #[test]
    fn test_missing_file_fails_to_open() {
        let source = CsvFileSource::new("definitely/not/here.csv");
        let result = source.open(ExecutionMode::Concurrent);
        assert!(matches!(result, Err(IngestError::Open { .. })));
    }
}
