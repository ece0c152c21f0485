use rust_decimal::Decimal;
use std::fmt;

/// One of the four recognised transaction attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    TransactionDate,
    AccountNumber,
    AccountHolderName,
    Amount,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::TransactionDate,
        Field::AccountNumber,
        Field::AccountHolderName,
        Field::Amount,
    ];

    /// The canonical CSV header for this field.
    pub fn header(&self) -> &'static str {
        match self {
            Field::TransactionDate => "Transaction Date",
            Field::AccountNumber => "Account Number",
            Field::AccountHolderName => "Account Holder Name",
            Field::Amount => "Amount",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(Decimal),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Number(value)
    }
}

/// An ordered header → value mapping.
///
/// Used both for rows as read from the file (raw headers) and for rows after
/// header normalization (canonical headers). Keys are unique; insertion order
/// is the column order of the source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, FieldValue)>,
}

pub type RawRow = Row;
pub type NormalizedRow = Row;

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts `value` under `key`, replacing an existing value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: Field,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: Field, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validation messages grouped by field.
///
/// A field without an entry has no errors; an entry is never an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    transaction_date: Option<Vec<String>>,
    account_number: Option<Vec<String>>,
    account_holder_name: Option<Vec<String>>,
    amount: Option<Vec<String>>,
}

impl FieldErrors {
    pub fn get(&self, field: Field) -> Option<&[String]> {
        self.slot(field).as_deref()
    }

    pub fn push(&mut self, issue: ValidationIssue) {
        self.slot_mut(issue.field)
            .get_or_insert_with(Vec::new)
            .push(issue.message);
    }

    pub fn is_empty(&self) -> bool {
        Field::ALL.iter().all(|f| self.slot(*f).is_none())
    }

    /// Failing fields with their messages, in canonical field order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &[String])> {
        Field::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|msgs| (f, msgs)))
    }

    fn slot(&self, field: Field) -> &Option<Vec<String>> {
        match field {
            Field::TransactionDate => &self.transaction_date,
            Field::AccountNumber => &self.account_number,
            Field::AccountHolderName => &self.account_holder_name,
            Field::Amount => &self.amount,
        }
    }

    fn slot_mut(&mut self, field: Field) -> &mut Option<Vec<String>> {
        match field {
            Field::TransactionDate => &mut self.transaction_date,
            Field::AccountNumber => &mut self.account_number,
            Field::AccountHolderName => &mut self.account_holder_name,
            Field::Amount => &mut self.amount,
        }
    }
}

impl FromIterator<ValidationIssue> for FieldErrors {
    fn from_iter<I: IntoIterator<Item = ValidationIssue>>(iter: I) -> Self {
        let mut errors = FieldErrors::default();
        for issue in iter {
            errors.push(issue);
        }
        errors
    }
}

/// The outcome of validating one CSV row.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    pub data: Row,
    pub is_valid: bool,
    pub errors: FieldErrors,
}

impl ParsedRecord {
    pub fn amount(&self) -> Option<&FieldValue> {
        self.data.get(Field::Amount.header())
    }
}
