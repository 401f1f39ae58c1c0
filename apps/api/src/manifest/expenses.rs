//! Freight and insurance totals derived from a waybill's expense lines.
//!
//! Each line carries a sender-side and a recipient-side amount. Only one side
//! counts: the sender amount when it is present and non-zero, otherwise the
//! recipient amount. The totals feed boxes 28 (freight) and 29 (insurance).

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::models::waybill::ExpenseLine;

// ────────────────────────────────────────────────────────────────────────────
// Types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseClass {
    Freight,
    Insurance,
}

impl ExpenseClass {
    /// A leg is insurance iff its label mentions "seguro", in any case.
    pub fn of(leg: &str) -> Self {
        if leg.to_lowercase().contains("seguro") {
            ExpenseClass::Insurance
        } else {
            ExpenseClass::Freight
        }
    }
}

/// Which side of the line the counted amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PayingSide {
    Sender,
    Recipient,
    /// Neither side carried an amount; the line counts as zero.
    None,
}

/// One line of the audit breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseEntry {
    pub leg: String,
    pub class: ExpenseClass,
    pub amount: Decimal,
    pub side: PayingSide,
    pub currency_id: Option<i64>,
    /// Set when both sides carried an amount and the recipient one was ignored.
    pub ignored_recipient_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExpenseTotals {
    pub freight: Decimal,
    pub insurance: Decimal,
}

impl ExpenseTotals {
    pub fn freight_text(&self) -> String {
        format_amount(self.freight)
    }

    pub fn insurance_text(&self) -> String {
        format_amount(self.insurance)
    }
}

/// A class total does not fit in a `Decimal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{class:?} total of the expense lines is too large")]
pub struct TotalOverflow {
    pub class: ExpenseClass,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExpenseBreakdown {
    pub entries: Vec<ExpenseEntry>,
    pub totals: ExpenseTotals,
    pub freight_text: String,
    pub insurance_text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregation
// ────────────────────────────────────────────────────────────────────────────

fn present(amount: Option<Decimal>) -> Option<Decimal> {
    amount.filter(|a| !a.is_zero())
}

/// Picks the amount that counts for one line.
pub fn classify_line(line: &ExpenseLine) -> ExpenseEntry {
    let class = ExpenseClass::of(&line.leg);

    let (amount, side, currency_id, ignored) = match present(line.sender_amount) {
        Some(sender) => (
            sender,
            PayingSide::Sender,
            line.sender_currency_id,
            present(line.recipient_amount),
        ),
        None => match line.recipient_amount {
            Some(recipient) => (
                recipient,
                PayingSide::Recipient,
                line.recipient_currency_id,
                None,
            ),
            None => (Decimal::ZERO, PayingSide::None, None, None),
        },
    };

    if let Some(dropped) = ignored {
        warn!(
            leg = %line.leg,
            sender = %amount,
            recipient = %dropped,
            "Expense line has amounts on both sides; recipient amount not counted"
        );
    }

    ExpenseEntry {
        leg: line.leg.clone(),
        class,
        amount,
        side,
        currency_id,
        ignored_recipient_amount: ignored,
    }
}

/// Sums the counted amount of every line per class.
pub fn aggregate_expenses(lines: &[ExpenseLine]) -> Result<ExpenseTotals, TotalOverflow> {
    Ok(breakdown(lines)?.totals)
}

pub fn breakdown(lines: &[ExpenseLine]) -> Result<ExpenseBreakdown, TotalOverflow> {
    let entries: Vec<ExpenseEntry> = lines.iter().map(classify_line).collect();

    let mut totals = ExpenseTotals::default();
    for entry in &entries {
        let total = match entry.class {
            ExpenseClass::Freight => &mut totals.freight,
            ExpenseClass::Insurance => &mut totals.insurance,
        };
        *total = total
            .checked_add(entry.amount)
            .ok_or(TotalOverflow { class: entry.class })?;
    }

    Ok(ExpenseBreakdown {
        freight_text: totals.freight_text(),
        insurance_text: totals.insurance_text(),
        entries,
        totals,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Number formatting
// ────────────────────────────────────────────────────────────────────────────

/// Formats an amount as `2.500,50`. Exactly zero formats to `""`.
pub fn format_amount(value: Decimal) -> String {
    if value.is_zero() {
        return String::new();
    }

    let mut rounded = value.round_dp(2);
    if rounded.is_zero() {
        rounded.set_sign_positive(true);
    }
    let fixed = format!("{rounded:.2}");
    let (sign, digits) = match fixed.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", fixed.as_str()),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{sign}{grouped},{frac_part}")
}

/// Parses `2.500,00`, `2500,00`, `2500.00` or `2500`.
///
/// A comma marks the decimal separator, in which case dots are thousands
/// separators. Without a comma the value is read as a plain decimal number.
pub fn parse_localized_amount(raw: &str) -> Option<Decimal> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        return None;
    }

    let normalized = if compact.contains(',') {
        if compact.matches(',').count() > 1 {
            return None;
        }
        compact.replace('.', "").replace(',', ".")
    } else {
        compact
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn line(leg: &str, sender: Option<&str>, recipient: Option<&str>) -> ExpenseLine {
        ExpenseLine {
            leg: leg.to_string(),
            sender_amount: sender.map(dec),
            sender_currency_id: Some(1),
            recipient_amount: recipient.map(dec),
            recipient_currency_id: Some(2),
        }
    }

    // ── aggregation ──

    #[test]
    fn test_freight_and_insurance_totals() {
        let lines = vec![
            line("Flete terrestre", Some("2500.00"), None),
            line("Seguro total", Some("300.00"), None),
        ];
        let totals = aggregate_expenses(&lines).unwrap();
        assert_eq!(totals.freight_text(), "2.500,00");
        assert_eq!(totals.insurance_text(), "300,00");
    }

    #[test]
    fn test_insurance_match_is_case_insensitive() {
        assert_eq!(ExpenseClass::of("SEGURO de carga"), ExpenseClass::Insurance);
        assert_eq!(ExpenseClass::of("Póliza de Seguro Internacional"), ExpenseClass::Insurance);
        assert_eq!(ExpenseClass::of("Flete"), ExpenseClass::Freight);
    }

    #[test]
    fn test_sender_side_wins_when_both_present() {
        let entry = classify_line(&line("Flete", Some("100"), Some("40")));
        assert_eq!(entry.amount, dec("100"));
        assert_eq!(entry.side, PayingSide::Sender);
        assert_eq!(entry.currency_id, Some(1));
        assert_eq!(entry.ignored_recipient_amount, Some(dec("40")));
    }

    #[test]
    fn test_zero_sender_amount_falls_back_to_recipient() {
        let entry = classify_line(&line("Flete", Some("0"), Some("75.5")));
        assert_eq!(entry.amount, dec("75.5"));
        assert_eq!(entry.side, PayingSide::Recipient);
        assert_eq!(entry.currency_id, Some(2));
    }

    #[test]
    fn test_line_without_amounts_counts_as_zero() {
        let entry = classify_line(&line("Seguro", None, None));
        assert_eq!(entry.amount, Decimal::ZERO);
        assert_eq!(entry.side, PayingSide::None);
    }

    #[test]
    fn test_totals_equal_sum_of_chosen_amounts() {
        let lines = vec![
            line("Flete Asunción-Foz", Some("1200"), Some("999")),
            line("Flete Foz-Santos", None, Some("800.25")),
            line("Seguro", None, Some("15")),
            line("seguro adicional", Some("5"), None),
        ];
        let result = breakdown(&lines).unwrap();
        let freight: Decimal = result
            .entries
            .iter()
            .filter(|e| e.class == ExpenseClass::Freight)
            .map(|e| e.amount)
            .sum();
        assert_eq!(result.totals.freight, freight);
        assert_eq!(result.totals.freight, dec("2000.25"));
        assert_eq!(result.totals.insurance, dec("20"));
        assert_eq!(result.freight_text, "2.000,25");
    }

    #[test]
    fn test_no_lines_gives_empty_texts() {
        let totals = aggregate_expenses(&[]).unwrap();
        assert_eq!(totals.freight_text(), "");
        assert_eq!(totals.insurance_text(), "");
    }

    #[test]
    fn test_total_overflow_is_an_error() {
        let max = Decimal::MAX.to_string();
        let lines = vec![
            line("Flete", Some(&max), None),
            line("Flete retorno", Some(&max), None),
        ];
        assert_eq!(
            aggregate_expenses(&lines),
            Err(TotalOverflow { class: ExpenseClass::Freight })
        );

        let one_each = vec![line("Flete", Some(&max), None), line("Seguro", Some(&max), None)];
        assert!(breakdown(&one_each).is_ok());
    }

    // ── formatting ──

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec("2500.5")), "2.500,50");
        assert_eq!(format_amount(dec("0")), "");
        assert_eq!(format_amount(dec("0.00")), "");
        assert_eq!(format_amount(dec("12")), "12,00");
        assert_eq!(format_amount(dec("999")), "999,00");
        assert_eq!(format_amount(dec("1000")), "1.000,00");
        assert_eq!(format_amount(dec("1234567.891")), "1.234.567,89");
        assert_eq!(format_amount(dec("-1500")), "-1.500,00");
        assert_eq!(format_amount(dec("-0.001")), "0,00");
    }

    // ── parsing ──

    #[test]
    fn test_parse_localized_amount() {
        assert_eq!(parse_localized_amount("2.500,00"), Some(dec("2500.00")));
        assert_eq!(parse_localized_amount("2500,5"), Some(dec("2500.5")));
        assert_eq!(parse_localized_amount("2500.75"), Some(dec("2500.75")));
        assert_eq!(parse_localized_amount(" 2500 "), Some(dec("2500")));
        assert_eq!(parse_localized_amount("1.234.567,89"), Some(dec("1234567.89")));
    }

    #[test]
    fn test_parse_localized_amount_rejects_garbage() {
        assert_eq!(parse_localized_amount(""), None);
        assert_eq!(parse_localized_amount("abc"), None);
        assert_eq!(parse_localized_amount("1,2,3"), None);
    }
}
