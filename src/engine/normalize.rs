use crate::config::HeaderMode;
use crate::record::{Field, NormalizedRow, RawRow};

use std::collections::HashMap;

const SYNONYMS: [(&str, Field); 3] = [
    ("txn date", Field::TransactionDate),
    ("acct number", Field::AccountNumber),
    ("name", Field::AccountHolderName),
];

/// Maps raw CSV headers onto the canonical field names.
#[derive(Debug, Clone)]
pub struct HeaderNormalizer {
    table: HashMap<String, Field>,
}

impl HeaderNormalizer {
    pub fn new(mode: HeaderMode) -> Self {
        let mut table: HashMap<String, Field> = Field::ALL
            .into_iter()
            .map(|f| (match_key(f.header()), f))
            .collect();

        if mode == HeaderMode::Permissive {
            for (synonym, field) in SYNONYMS {
                table.insert(match_key(synonym), field);
            }
        }

        Self { table }
    }

    pub fn canonical(&self, raw_key: &str) -> Option<Field> {
        self.table.get(&match_key(raw_key)).copied()
    }

    /// Rewrites recognised keys to their canonical header. Unrecognised keys
    /// pass through unchanged; the first key to claim a slot keeps it.
    pub fn normalize(&self, row: RawRow) -> NormalizedRow {
        let mut out = NormalizedRow::new();
        for (raw_key, value) in row.iter() {
            let key = match self.canonical(raw_key) {
                Some(field) => field.header(),
                None => raw_key,
            };
            if !out.contains_key(key) {
                out.insert(key, value.clone());
            }
        }
        out
    }
}

impl Default for HeaderNormalizer {
    fn default() -> Self {
        Self::new(HeaderMode::default())
    }
}

/// Trim, collapse whitespace runs, lowercase.
fn match_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
