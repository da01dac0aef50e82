//! Resolved operations: the structured intent extracted from one utterance.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::period::PeriodToken;

/// Transaction direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    Income,
    Expense,
}

impl TxKind {
    /// Lenient parse; anything unrecognized is treated as an expense, the
    /// overwhelmingly common case for chat-entered records.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "income" | "in" => TxKind::Income,
            _ => TxKind::Expense,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TxKind::Income => "income",
            TxKind::Expense => "expense",
        }
    }
}

/// What a ledger query should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    #[default]
    Summary,
    Expenses,
    Income,
    Balance,
    Detailed,
}

impl QueryKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "expenses" | "expense" => QueryKind::Expenses,
            "income" => QueryKind::Income,
            "balance" => QueryKind::Balance,
            "detailed" | "transactions" => QueryKind::Detailed,
            _ => QueryKind::Summary,
        }
    }
}

/// One transaction to record. `amount` is always positive; direction lives
/// in `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterItem {
    pub amount: f64,
    pub kind: TxKind,
    pub category: String,
    pub description: String,
    pub date: NaiveDate,
}

/// Explicit calendar-day bounds for a custom query window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplicitRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// A second window to compare the main query window against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonSpec {
    pub period: PeriodToken,
    #[serde(default)]
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub range: Option<ExplicitRange>,
}

/// A ledger query over one period, optionally filtered and compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOp {
    pub period: PeriodToken,
    pub kind: QueryKind,
    #[serde(default)]
    pub category: Option<String>,
    /// A specific single day ("on July 3rd").
    #[serde(default)]
    pub day: Option<NaiveDate>,
    #[serde(default)]
    pub range: Option<ExplicitRange>,
    #[serde(default)]
    pub comparison: Option<ComparisonSpec>,
}

impl QueryOp {
    pub fn new(period: PeriodToken, kind: QueryKind) -> Self {
        QueryOp {
            period,
            kind,
            category: None,
            day: None,
            range: None,
            comparison: None,
        }
    }
}

/// The closed set of operations a message can resolve to. Exactly one
/// variant per resolved message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum Operation {
    RegisterOne(RegisterItem),
    RegisterMany(Vec<RegisterItem>),
    Query(QueryOp),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_is_lenient() {
        assert_eq!(TxKind::parse("income"), TxKind::Income);
        assert_eq!(TxKind::parse("EXPENSE"), TxKind::Expense);
        assert_eq!(TxKind::parse("???"), TxKind::Expense);
    }

    #[test]
    fn test_query_kind_defaults_to_summary() {
        assert_eq!(QueryKind::parse("balance"), QueryKind::Balance);
        assert_eq!(QueryKind::parse("anything"), QueryKind::Summary);
    }

    #[test]
    fn test_operation_round_trips_through_json() {
        let op = Operation::Query(QueryOp::new(PeriodToken::LastWeek, QueryKind::Expenses));
        let json = serde_json::to_string(&op).unwrap();
        let back: Operation = serde_json::from_str(&json).unwrap();
        assert_eq!(op, back);
    }
}
