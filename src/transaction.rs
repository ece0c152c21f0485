use crate::engine::summary::record_amount;
use crate::record::{Field, ParsedRecord};

use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    Pending,
}

/// A validated CSV row in the shape handed to the submission handler.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub batch_name: String,
    pub approver: String,
    pub transaction_date: String,
    pub account_number: String,
    pub account_holder_name: String,
    pub amount: Decimal,
    pub status: TransactionStatus,
}

impl Transaction {
    pub fn from_record(record: &ParsedRecord, id: String, batch_name: &str, approver: &str) -> Self {
        let text = |field: Field| {
            record
                .data
                .get(field.header())
                .map(|v| v.to_string())
                .unwrap_or_default()
        };

        Self {
            id,
            batch_name: batch_name.to_string(),
            approver: approver.to_string(),
            transaction_date: text(Field::TransactionDate),
            account_number: text(Field::AccountNumber),
            account_holder_name: text(Field::AccountHolderName),
            amount: record_amount(record),
            status: TransactionStatus::Pending,
        }
    }
}

/// Converts the valid records into pending transactions.
///
/// Ids are `batch-<created_at_millis>-<n>`, numbered over valid records only.
pub fn to_transactions(
    records: &[ParsedRecord],
    batch_name: &str,
    approver: &str,
    created_at_millis: i64,
) -> Vec<Transaction> {
    records
        .iter()
        .filter(|r| r.is_valid)
        .enumerate()
        .map(|(index, record)| {
            let id = format!("batch-{}-{}", created_at_millis, index);
            Transaction::from_record(record, id, batch_name, approver)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::normalize::HeaderNormalizer;
    use crate::engine::validate::validate;
    use crate::record::RawRow;
    use std::str::FromStr;

    fn record(date: &str, account: &str, name: &str, amount: &str) -> ParsedRecord {
        let raw: RawRow = [
            ("Transaction Date", date),
            ("Account Number", account),
            ("Account Holder Name", name),
            ("Amount", amount),
        ]
        .into_iter()
        .collect();
        validate(HeaderNormalizer::default().normalize(raw))
    }

    #[test]
    fn test_only_valid_records_are_converted() {
        let records = vec![
            record("2025-01-01", "000-123456789-01", "Alice", "1,234.56"),
            record("2025-02-30", "000-123456789-01", "Bob", "10"),
            record("2025-01-03", "000-123456789-02", "Carol", "20"),
        ];

        let txs = to_transactions(&records, "March payroll", "approver-1", 1700000000000);

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].id, "batch-1700000000000-0");
        assert_eq!(txs[1].id, "batch-1700000000000-1");
        assert_eq!(txs[0].transaction_date, "2025-01-01");
        assert_eq!(txs[0].account_number, "000-123456789-01");
        assert_eq!(txs[0].account_holder_name, "Alice");
        assert_eq!(txs[0].amount, Decimal::from_str("1234.56").unwrap());
        assert_eq!(txs[0].batch_name, "March payroll");
        assert_eq!(txs[0].approver, "approver-1");
        assert_eq!(txs[1].account_holder_name, "Carol");
        assert!(txs.iter().all(|t| t.status == TransactionStatus::Pending));
    }

    #[test]
    fn test_no_valid_records_yields_nothing() {
        let records = vec![record("bad", "bad", "", "0")];
        assert!(to_transactions(&records, "b", "a", 0).is_empty());
    }
}
