use crate::engine::validate::parse_amount;
use crate::record::{FieldValue, ParsedRecord};

use rust_decimal::{Decimal, RoundingStrategy};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SummaryStatistics {
    pub total_amount: Decimal,
    pub number_of_payments: usize,
    pub average_payment_value: Decimal,
}

/// Totals the valid records. Non-numeric amounts on valid records count as zero.
///
/// The total saturates at `Decimal::MAX` instead of overflowing.
pub fn summarize(records: &[ParsedRecord]) -> SummaryStatistics {
    let (total_amount, number_of_payments) = records
        .iter()
        .filter(|r| r.is_valid)
        .map(record_amount)
        .fold((Decimal::ZERO, 0usize), |(sum, n), amount| (sum.saturating_add(amount), n + 1));

    let average_payment_value = if number_of_payments == 0 {
        Decimal::ZERO
    } else {
        total_amount
            .checked_div(Decimal::from(number_of_payments))
            .unwrap_or(total_amount)
    };

    SummaryStatistics {
        total_amount,
        number_of_payments,
        average_payment_value,
    }
}

pub(crate) fn record_amount(record: &ParsedRecord) -> Decimal {
    match record.amount() {
        Some(FieldValue::Number(n)) => *n,
        Some(FieldValue::Text(s)) => parse_amount(s).unwrap_or(Decimal::ZERO),
        None => Decimal::ZERO,
    }
}

/// Formats `amount` as US dollars: `$1,234.56`, `-$5.00`.
///
/// Rounds to cents, half away from zero.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let cents = format!("{:.2}", rounded.abs());
    let (whole, fraction) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{}${}.{}", sign, group_thousands(whole), fraction)
}

/// Formats a payment count with thousands separators.
pub fn format_count(count: usize) -> String {
    group_thousands(&count.to_string())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Field, FieldErrors, Row, ValidationIssue};
    use std::str::FromStr;

    fn valid(amount: FieldValue) -> ParsedRecord {
        let mut data = Row::new();
        data.insert(Field::Amount.header(), amount);
        ParsedRecord {
            data,
            is_valid: true,
            errors: FieldErrors::default(),
        }
    }

    fn invalid(amount: &str) -> ParsedRecord {
        let mut data = Row::new();
        data.insert(Field::Amount.header(), amount);
        ParsedRecord {
            data,
            is_valid: false,
            errors: std::iter::once(ValidationIssue::new(Field::Amount, "bad")).collect(),
        }
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_summarize_ignores_invalid_records() {
        let records = vec![
            valid(FieldValue::Number(dec("100"))),
            valid(FieldValue::Number(dec("250.5"))),
            invalid("999"),
        ];

        let stats = summarize(&records);
        assert_eq!(stats.total_amount, dec("350.5"));
        assert_eq!(stats.number_of_payments, 2);
        assert_eq!(stats.average_payment_value, dec("175.25"));
    }

    #[test]
    fn test_summarize_empty_is_all_zero() {
        assert_eq!(summarize(&[]), SummaryStatistics::default());
        assert_eq!(summarize(&[invalid("10")]), SummaryStatistics::default());
    }

    #[test]
    fn test_summarize_parses_text_amounts() {
        let records = vec![
            valid(FieldValue::Number(dec("100"))),
            valid(FieldValue::Number(dec("250.5"))),
            valid(FieldValue::from("75.25")),
        ];

        let stats = summarize(&records);
        assert_eq!(stats.total_amount, dec("425.75"));
        assert_eq!(stats.number_of_payments, 3);
        assert_eq!(format_currency(stats.average_payment_value), "$141.92");
    }

    #[test]
    fn test_unparseable_amount_counts_as_zero() {
        let records = vec![valid(FieldValue::from("abc")), valid(FieldValue::Number(dec("10")))];

        let stats = summarize(&records);
        assert_eq!(stats.total_amount, dec("10"));
        assert_eq!(stats.number_of_payments, 2);
        assert_eq!(stats.average_payment_value, dec("5"));
    }

    #[test]
    fn test_huge_totals_saturate() {
        let records = vec![
            valid(FieldValue::Number(Decimal::MAX)),
            valid(FieldValue::Number(Decimal::MAX)),
            valid(FieldValue::Number(dec("1"))),
        ];

        let stats = summarize(&records);
        assert_eq!(stats.total_amount, Decimal::MAX);
        assert_eq!(stats.number_of_payments, 3);
        assert_eq!(stats.average_payment_value, Decimal::MAX / Decimal::from(3));
        assert!(format_currency(stats.total_amount).starts_with("$79,228,162,514,264,"));
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(dec("1051.5")), "$1,051.50");
        assert_eq!(format_currency(dec("210.3")), "$210.30");
        assert_eq!(format_currency(Decimal::ZERO), "$0.00");
        assert_eq!(format_currency(dec("999.999")), "$1,000.00");
        assert_eq!(format_currency(dec("1234567.891")), "$1,234,567.89");
        assert_eq!(format_currency(dec("-5")), "-$5.00");
    }

    #[test]
    fn test_format_currency_rounds_half_away_from_zero() {
        assert_eq!(format_currency(dec("0.125")), "$0.13");
        assert_eq!(format_currency(dec("0.135")), "$0.14");
        assert_eq!(format_currency(dec("-0.125")), "-$0.13");
        assert_eq!(format_currency(dec("-0.001")), "$0.00");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(5), "5");
        assert_eq!(format_count(1000), "1,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
