use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parser backend failed: {0}")]
    Backend(String),

    #[error("No rows parsed within {0:?}")]
    Stalled(Duration),

    #[error("Parser worker exited without finishing")]
    WorkerLost,

    #[error("Ingestion task failed: {0}")]
    TaskFailed(String),
}

/// Why a CSV amount could not be read as a `Decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("no leading number")]
    NotANumber,

    #[error("number does not fit a decimal amount")]
    OutOfRange { negative: bool },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_error_mentions_path() {
        let err = IngestError::Open {
            path: PathBuf::from("/tmp/missing.csv"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/missing.csv"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_stalled_error_display() {
        let err = IngestError::Stalled(Duration::from_millis(5000));
        assert_eq!(err.to_string(), "No rows parsed within 5s");
    }
}
