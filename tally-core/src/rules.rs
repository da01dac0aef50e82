//! Rule-based parsing of simple transaction and query phrases.
//!
//! This is the non-LLM path: a handful of verb patterns and an ordered
//! phrase table. Not matching is the normal outcome for anything else;
//! these functions never fail, they just decline.

use std::sync::LazyLock;

use chrono::{Days, NaiveDateTime};
use regex::Regex;

use crate::category;
use crate::operation::{QueryKind, QueryOp, RegisterItem, TxKind};
use crate::period::PeriodToken;

/// Verb + amount + free-text object, e.g. "spent 50 on lunch yesterday".
static TX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(spent|paid|bought|purchased|received|earned|got)\b\s+\$?(\d+(?:[.,]\d{1,2})?)\b\s*(.*)$")
        .expect("transaction pattern compiles")
});

const EXPENSE_VERBS: &[&str] = &["spent", "paid", "bought", "purchased"];
const LEADING_PREPOSITIONS: &[&str] = &["on", "for", "from", "at", "in"];

/// Ordered phrase table for simple queries; first match wins. Entries with
/// more specific period phrases come before their generic fallbacks.
const QUERY_RULES: &[(&[&str], PeriodToken, QueryKind)] = &[
    (&["spend", "yesterday"], PeriodToken::Yesterday, QueryKind::Expenses),
    (&["spent", "yesterday"], PeriodToken::Yesterday, QueryKind::Expenses),
    (&["spend", "today"], PeriodToken::Today, QueryKind::Expenses),
    (&["spent", "today"], PeriodToken::Today, QueryKind::Expenses),
    (&["spend", "last week"], PeriodToken::LastWeek, QueryKind::Expenses),
    (&["spent", "last week"], PeriodToken::LastWeek, QueryKind::Expenses),
    (&["spend", "week"], PeriodToken::Week, QueryKind::Expenses),
    (&["spent", "week"], PeriodToken::Week, QueryKind::Expenses),
    (&["spend", "last month"], PeriodToken::LastMonth, QueryKind::Expenses),
    (&["spent", "last month"], PeriodToken::LastMonth, QueryKind::Expenses),
    (&["spend", "last year"], PeriodToken::LastYear, QueryKind::Expenses),
    (&["spent", "last year"], PeriodToken::LastYear, QueryKind::Expenses),
    (&["spend", "year"], PeriodToken::Year, QueryKind::Expenses),
    (&["spent", "year"], PeriodToken::Year, QueryKind::Expenses),
    (&["spend"], PeriodToken::Month, QueryKind::Expenses),
    (&["spent"], PeriodToken::Month, QueryKind::Expenses),
    (&["expenses"], PeriodToken::Month, QueryKind::Expenses),
    (&["earn", "today"], PeriodToken::Today, QueryKind::Income),
    (&["receive", "today"], PeriodToken::Today, QueryKind::Income),
    (&["earn"], PeriodToken::Month, QueryKind::Income),
    (&["receive"], PeriodToken::Month, QueryKind::Income),
    (&["income"], PeriodToken::Month, QueryKind::Income),
    (&["balance"], PeriodToken::Month, QueryKind::Balance),
    (&["summary"], PeriodToken::Month, QueryKind::Summary),
    (&["transactions"], PeriodToken::Month, QueryKind::Detailed),
    (&["detailed"], PeriodToken::Month, QueryKind::Detailed),
];

/// Recognize a single transaction statement. Returns `None` when the text
/// doesn't look like one.
pub fn parse_transaction(text: &str, now: NaiveDateTime) -> Option<RegisterItem> {
    let caps = TX_PATTERN.captures(text)?;

    let verb = caps.get(1)?.as_str().to_lowercase();
    let kind = if EXPENSE_VERBS.contains(&verb.as_str()) {
        TxKind::Expense
    } else {
        TxKind::Income
    };

    let amount: f64 = caps.get(2)?.as_str().replace(',', ".").parse().ok()?;
    if amount <= 0.0 {
        return None;
    }

    let mut rest = caps.get(3).map(|m| m.as_str()).unwrap_or("").trim();

    // Trailing temporal marker selects the date.
    let mut date = now.date();
    let lowered = rest.to_lowercase();
    if lowered.ends_with("yesterday") {
        date = date.checked_sub_days(Days::new(1)).unwrap_or(date);
        rest = rest[..rest.len() - "yesterday".len()].trim_end();
    } else if lowered.ends_with("today") {
        rest = rest[..rest.len() - "today".len()].trim_end();
    }

    // "on lunch" / "from salary": the preposition isn't part of the object.
    if let Some((first, tail)) = rest.split_once(char::is_whitespace) {
        if LEADING_PREPOSITIONS.contains(&first.to_lowercase().as_str()) {
            rest = tail.trim_start();
        }
    }

    let description = rest.trim_end_matches(['.', '!', '?', ',']).trim().to_string();
    let category = category::infer(&description, kind).to_string();

    Some(RegisterItem {
        amount,
        kind,
        category,
        description,
        date,
    })
}

/// Recognize a simple query statement against the ordered phrase table.
pub fn parse_query(text: &str) -> Option<QueryOp> {
    let lowered = text.to_lowercase();
    for &(needles, period, kind) in QUERY_RULES {
        if needles.iter().all(|n| lowered.contains(n)) {
            return Some(QueryOp::new(period, kind));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn noon(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_spent_on_lunch() {
        let now = noon(2025, 7, 15);
        let item = parse_transaction("spent 50 on lunch", now).unwrap();
        assert_eq!(item.amount, 50.0);
        assert_eq!(item.kind, TxKind::Expense);
        assert!(item.description.contains("lunch"));
        assert_eq!(item.category, "Food");
        assert_eq!(item.date, now.date());
    }

    #[test]
    fn test_received_from_salary() {
        let now = noon(2025, 7, 15);
        let item = parse_transaction("received 3000 from salary", now).unwrap();
        assert_eq!(item.amount, 3000.0);
        assert_eq!(item.kind, TxKind::Income);
        assert_eq!(item.category, "Salary");
        assert_eq!(item.date, now.date());
    }

    #[test]
    fn test_trailing_yesterday_marker() {
        let now = noon(2025, 7, 15);
        let item = parse_transaction("paid 20.50 for parking yesterday", now).unwrap();
        assert_eq!(item.amount, 20.5);
        assert_eq!(item.date, NaiveDate::from_ymd_opt(2025, 7, 14).unwrap());
        assert_eq!(item.description, "parking");
    }

    #[test]
    fn test_decimal_comma_amount() {
        let now = noon(2025, 7, 15);
        let item = parse_transaction("bought 15,90 groceries", now).unwrap();
        assert_eq!(item.amount, 15.9);
        assert_eq!(item.category, "Food");
    }

    #[test]
    fn test_hello_parses_as_nothing() {
        let now = noon(2025, 7, 15);
        assert!(parse_transaction("hello", now).is_none());
        assert!(parse_query("hello").is_none());
    }

    #[test]
    fn test_query_phrases() {
        let q = parse_query("how much did I spend today?").unwrap();
        assert_eq!(q.period, PeriodToken::Today);
        assert_eq!(q.kind, QueryKind::Expenses);

        let q = parse_query("how much did I spend this month?").unwrap();
        assert_eq!(q.period, PeriodToken::Month);
        assert_eq!(q.kind, QueryKind::Expenses);

        let q = parse_query("what's my balance").unwrap();
        assert_eq!(q.period, PeriodToken::Month);
        assert_eq!(q.kind, QueryKind::Balance);

        let q = parse_query("summary").unwrap();
        assert_eq!(q.kind, QueryKind::Summary);
    }

    #[test]
    fn test_specific_period_beats_generic() {
        let q = parse_query("how much did I spend last week").unwrap();
        assert_eq!(q.period, PeriodToken::LastWeek);

        let q = parse_query("what did I spend this week").unwrap();
        assert_eq!(q.period, PeriodToken::Week);
    }

    #[test]
    fn test_query_text_without_amount_is_not_a_transaction() {
        let now = noon(2025, 7, 15);
        assert!(parse_transaction("how much have I spent today", now).is_none());
    }
}
