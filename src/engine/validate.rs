use crate::error::AmountError;
use crate::record::{Field, FieldErrors, FieldValue, NormalizedRow, ParsedRecord, ValidationIssue};

use chrono::NaiveDate;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::OnceLock;

pub const REQUIRED: &str = "Required";
pub const EXPECTED_STRING: &str = "Expected string, received number";
pub const DATE_FORMAT: &str = "Date must be in YYYY-MM-DD format";
pub const INVALID_DATE: &str = "Invalid date";
pub const ACCOUNT_NUMBER_FORMAT: &str = "Account number must follow format: 000-000000000-00";
pub const HOLDER_NAME_REQUIRED: &str = "Account holder name is required";
pub const AMOUNT_NOT_POSITIVE: &str = "Amount must be a positive number";
pub const AMOUNT_OUT_OF_RANGE: &str = "Amount is out of range";

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("invalid date regex"))
}

fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]{3}-[0-9]{9}-[0-9]{2}$").expect("invalid account regex"))
}

fn float_prefix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<sign>[+-]?)(?:(?P<inf>Infinity)|(?P<int>[0-9]*)(?:\.(?P<frac>[0-9]*))?(?:[eE](?P<exp>[+-]?[0-9]+))?)",
        )
        .expect("invalid amount regex")
    })
}

/// Parses a CSV amount: trims, drops thousands separators, then reads the
/// longest leading decimal literal (`"12abc"` reads as 12, `"1_000"` as 1).
///
/// Literals that are numbers but cannot be held by a `Decimal` (`Infinity`,
/// `1e29`, `1e-40`) are reported as out of range.
pub fn parse_amount(raw: &str) -> Result<Decimal, AmountError> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let caps = float_prefix_re()
        .captures(&cleaned)
        .ok_or(AmountError::NotANumber)?;

    let negative = &caps["sign"] == "-";
    let out_of_range = AmountError::OutOfRange { negative };
    if caps.name("inf").is_some() {
        return Err(out_of_range);
    }

    let int = caps.name("int").map_or("", |m| m.as_str());
    let frac = caps.name("frac").map_or("", |m| m.as_str());
    if int.is_empty() && frac.is_empty() {
        return Err(AmountError::NotANumber);
    }

    let sign = if negative { "-" } else { "" };
    let int = if int.is_empty() { "0" } else { int };
    let mantissa = if frac.is_empty() {
        format!("{}{}", sign, int)
    } else {
        format!("{}{}.{}", sign, int, frac)
    };
    let parsed = match caps.name("exp") {
        Some(exp) => Decimal::from_scientific(&format!("{}e{}", mantissa, exp.as_str())),
        None => Decimal::from_str(&mantissa),
    };
    parsed.map_err(|_| out_of_range)
}

/// Checks that `date` is `YYYY-MM-DD` and names a real calendar day.
pub fn is_calendar_date(date: &str) -> bool {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|parsed| parsed.format("%Y-%m-%d").to_string() == date)
        .unwrap_or(false)
}

/// Validates one normalized row against the transaction schema.
pub fn validate(row: NormalizedRow) -> ParsedRecord {
    let mut issues = Vec::new();

    check_date(row.get(Field::TransactionDate.header()), &mut issues);
    check_account_number(row.get(Field::AccountNumber.header()), &mut issues);
    check_holder_name(row.get(Field::AccountHolderName.header()), &mut issues);
    let amount = check_amount(row.get(Field::Amount.header()), &mut issues);

    if let (true, Some(amount)) = (issues.is_empty(), amount) {
        let mut data = row;
        data.insert(Field::Amount.header(), FieldValue::Number(amount));
        return ParsedRecord {
            data,
            is_valid: true,
            errors: FieldErrors::default(),
        };
    }

    ParsedRecord {
        data: row,
        is_valid: false,
        errors: issues.into_iter().collect(),
    }
}

/// Resolves a field that must be text, recording why when it is not.
fn text_field<'a>(
    field: Field,
    value: Option<&'a FieldValue>,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a str> {
    match value {
        None => {
            issues.push(ValidationIssue::new(field, REQUIRED));
            None
        }
        Some(FieldValue::Number(_)) => {
            issues.push(ValidationIssue::new(field, EXPECTED_STRING));
            None
        }
        Some(FieldValue::Text(s)) => Some(s.as_str()),
    }
}

fn check_date(value: Option<&FieldValue>, issues: &mut Vec<ValidationIssue>) {
    let Some(date) = text_field(Field::TransactionDate, value, issues) else {
        return;
    };

    if !date_re().is_match(date) {
        issues.push(ValidationIssue::new(Field::TransactionDate, DATE_FORMAT));
    }
    // Runs regardless of the shape check; a malformed date never round-trips.
    if !is_calendar_date(date) {
        issues.push(ValidationIssue::new(Field::TransactionDate, INVALID_DATE));
    }
}

fn check_account_number(value: Option<&FieldValue>, issues: &mut Vec<ValidationIssue>) {
    let Some(account) = text_field(Field::AccountNumber, value, issues) else {
        return;
    };

    if !account_re().is_match(account) {
        issues.push(ValidationIssue::new(
            Field::AccountNumber,
            ACCOUNT_NUMBER_FORMAT,
        ));
    }
}

fn check_holder_name(value: Option<&FieldValue>, issues: &mut Vec<ValidationIssue>) {
    let Some(name) = text_field(Field::AccountHolderName, value, issues) else {
        return;
    };

    if name.is_empty() {
        issues.push(ValidationIssue::new(
            Field::AccountHolderName,
            HOLDER_NAME_REQUIRED,
        ));
    }
}

fn check_amount(value: Option<&FieldValue>, issues: &mut Vec<ValidationIssue>) -> Option<Decimal> {
    let parsed = match value {
        None => {
            issues.push(ValidationIssue::new(Field::Amount, REQUIRED));
            return None;
        }
        Some(FieldValue::Number(n)) => Ok(*n),
        Some(FieldValue::Text(s)) => parse_amount(s),
    };

    let message = match parsed {
        Ok(amount) if amount > Decimal::ZERO => return Some(amount),
        Err(AmountError::OutOfRange { negative: false }) => AMOUNT_OUT_OF_RANGE,
        _ => AMOUNT_NOT_POSITIVE,
    };
    issues.push(ValidationIssue::new(Field::Amount, message));
    None
}
