//! Executes resolved operations against the ledger and formats the reply.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

use tally_core::{
    ComparisonSpec, DateRange, ExplicitRange, PeriodToken, QueryKind, QueryOp, RegisterItem,
    TxKind, period,
};

use crate::store::{LedgerStore, MessageSource, NewTransaction, TransactionRecord, User};

/// Detailed listings are capped so one query can't flood the chat.
const DETAIL_LIMIT: usize = 15;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CategoryTotals {
    pub income: f64,
    pub expense: f64,
}

/// Working result of one query; transient, never persisted.
#[derive(Debug, Default)]
pub struct FinancialSnapshot {
    pub total: Option<f64>,
    pub income_total: Option<f64>,
    pub expense_total: Option<f64>,
    pub transactions: Option<Vec<TransactionRecord>>,
    pub by_category: Option<BTreeMap<String, CategoryTotals>>,
}

#[derive(Debug)]
pub struct QueryOutcome {
    pub text: String,
    pub snapshot: FinancialSnapshot,
}

#[derive(Clone)]
pub struct QueryExecutor {
    ledger: Arc<dyn LedgerStore>,
}

impl QueryExecutor {
    pub fn new(ledger: Arc<dyn LedgerStore>) -> Self {
        QueryExecutor { ledger }
    }

    /// Persist one or more transactions and build a single aggregated reply
    /// with count, per-item lines, and grand total. Never one message per item.
    pub async fn register(
        &self,
        items: &[RegisterItem],
        user: &User,
        now: NaiveDateTime,
        source: MessageSource,
    ) -> Result<String> {
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            let category = self
                .ledger
                .get_or_create_category(&item.category, item.kind)
                .await
                .with_context(|| format!("category lookup for {}", item.category))?;

            let record = self
                .ledger
                .create_transaction(NewTransaction {
                    user_id: user.id,
                    category_id: category.id,
                    kind: item.kind,
                    amount: item.amount,
                    description: item.description.clone(),
                    date: item.date,
                    source,
                })
                .await
                .context("persisting transaction")?;
            created.push(record);
        }

        Ok(match created.as_slice() {
            [] => "Nothing to record.".to_string(),
            [one] => format!(
                "Recorded {} of ${:.2} — {} ({}), {}.",
                one.kind.label(),
                one.amount,
                describe(&one.description),
                one.category,
                date_label(one.date, now),
            ),
            many => {
                let mut lines = vec![format!("Recorded {} transactions:", many.len())];
                for tx in many {
                    lines.push(format!(
                        "- ${:.2} {} — {} ({}), {}",
                        tx.amount,
                        tx.kind.label(),
                        describe(&tx.description),
                        tx.category,
                        date_label(tx.date, now),
                    ));
                }
                let total: f64 = many.iter().map(|t| t.amount).sum();
                lines.push(format!("Total: ${total:.2}"));
                lines.join("\n")
            }
        })
    }

    /// Run a ledger query and format a human-readable reply.
    pub async fn query(&self, op: &QueryOp, user: &User, now: NaiveDateTime) -> Result<QueryOutcome> {
        let range = resolve_window(op.period, op.day, op.range, now);
        let label = window_label(op.period, op.day, op.range);

        let mut snapshot = FinancialSnapshot::default();
        let mut text = match op.kind {
            QueryKind::Balance => {
                let b = self.ledger.get_balance(user.id, &range).await?;
                snapshot.income_total = Some(b.income);
                snapshot.expense_total = Some(b.expense);
                snapshot.total = Some(b.balance);
                format!(
                    "Balance for {label}: income ${:.2}, expenses ${:.2}, net ${:.2}.",
                    b.income, b.expense, b.balance
                )
            }
            QueryKind::Expenses | QueryKind::Income => {
                let kind = if op.kind == QueryKind::Expenses {
                    TxKind::Expense
                } else {
                    TxKind::Income
                };
                let txs = self
                    .ledger
                    .get_transactions(user.id, Some(kind), Some(&range), op.category.as_deref())
                    .await?;
                let total: f64 = txs.iter().map(|t| t.amount).sum();
                let verb = if kind == TxKind::Expense { "spent" } else { "received" };
                let scope = op
                    .category
                    .as_deref()
                    .map(|c| format!(" on {c}"))
                    .unwrap_or_default();
                let line = format!(
                    "You {verb} ${total:.2}{scope} across {} transaction{} {label}.",
                    txs.len(),
                    plural(txs.len()),
                );
                snapshot.total = Some(total);
                snapshot.transactions = Some(txs);
                line
            }
            QueryKind::Summary => {
                let txs = self
                    .ledger
                    .get_transactions(user.id, None, Some(&range), op.category.as_deref())
                    .await?;
                let by_category = group_by_category(&txs);
                let income: f64 = by_category.values().map(|t| t.income).sum();
                let expense: f64 = by_category.values().map(|t| t.expense).sum();

                let mut lines = vec![
                    format!("Summary for {label}:"),
                    format!("Income: ${income:.2}"),
                    format!("Expenses: ${expense:.2}"),
                    format!("Net: ${:.2}", income - expense),
                ];
                let spenders: Vec<(&String, &CategoryTotals)> = by_category
                    .iter()
                    .filter(|(_, t)| t.expense > 0.0)
                    .collect();
                if !spenders.is_empty() {
                    lines.push("By category:".to_string());
                    for (name, totals) in spenders {
                        lines.push(format!("- {name}: ${:.2}", totals.expense));
                    }
                }

                snapshot.income_total = Some(income);
                snapshot.expense_total = Some(expense);
                snapshot.total = Some(income - expense);
                snapshot.by_category = Some(by_category);
                snapshot.transactions = Some(txs);
                lines.join("\n")
            }
            QueryKind::Detailed => {
                let txs = self
                    .ledger
                    .get_transactions(user.id, None, Some(&range), op.category.as_deref())
                    .await?;
                if txs.is_empty() {
                    format!("No transactions {label}.")
                } else {
                    let mut lines = vec![format!(
                        "{} transaction{} {label}:",
                        txs.len(),
                        plural(txs.len())
                    )];
                    for tx in txs.iter().take(DETAIL_LIMIT) {
                        let sign = match tx.kind {
                            TxKind::Income => "+",
                            TxKind::Expense => "-",
                        };
                        lines.push(format!(
                            "- {}: {} {sign}${:.2}",
                            date_label(tx.date, now),
                            describe(&tx.description),
                            tx.amount,
                        ));
                    }
                    if txs.len() > DETAIL_LIMIT {
                        lines.push(format!("…and {} more", txs.len() - DETAIL_LIMIT));
                    }
                    let text = lines.join("\n");
                    snapshot.transactions = Some(txs);
                    text
                }
            }
        };

        if let Some(cmp) = &op.comparison {
            let main_total = snapshot.total.unwrap_or(0.0);
            let block = self
                .comparison_block(cmp, op.kind, op.category.as_deref(), main_total, user, now)
                .await?;
            text.push('\n');
            text.push_str(&block);
        }

        Ok(QueryOutcome { text, snapshot })
    }

    /// Fetch the comparison window's counterpart total and phrase the delta.
    /// The comparison covers the same slice as the main query: same kind,
    /// same category filter, only the window differs.
    async fn comparison_block(
        &self,
        cmp: &ComparisonSpec,
        kind: QueryKind,
        category: Option<&str>,
        main_total: f64,
        user: &User,
        now: NaiveDateTime,
    ) -> Result<String> {
        let range = resolve_window(cmp.period, cmp.day, cmp.range, now);
        let label = window_label(cmp.period, cmp.day, cmp.range);

        let cmp_total = match kind {
            QueryKind::Expenses => {
                let txs = self
                    .ledger
                    .get_transactions(user.id, Some(TxKind::Expense), Some(&range), category)
                    .await?;
                txs.iter().map(|t| t.amount).sum()
            }
            QueryKind::Income => {
                let txs = self
                    .ledger
                    .get_transactions(user.id, Some(TxKind::Income), Some(&range), category)
                    .await?;
                txs.iter().map(|t| t.amount).sum()
            }
            _ if category.is_some() => {
                let txs = self
                    .ledger
                    .get_transactions(user.id, None, Some(&range), category)
                    .await?;
                txs.iter()
                    .map(|t| match t.kind {
                        TxKind::Income => t.amount,
                        TxKind::Expense => -t.amount,
                    })
                    .sum()
            }
            _ => self.ledger.get_balance(user.id, &range).await?.balance,
        };

        let difference = main_total - cmp_total;
        let percent = percent_change(difference, cmp_total);
        let direction = if difference >= 0.0 { "more" } else { "less" };

        Ok(format!(
            "Compared with {label} (${cmp_total:.2}): ${:.2} {direction} ({percent:+.1}%).",
            difference.abs(),
        ))
    }
}

/// `comparison_total == 0` is flat, not a division fault.
pub fn percent_change(difference: f64, comparison_total: f64) -> f64 {
    if comparison_total == 0.0 {
        0.0
    } else {
        difference / comparison_total * 100.0
    }
}

/// "today"/"yesterday" when the calendar day matches, otherwise
/// "<weekday>, dd/mm/yyyy".
pub fn date_label(date: NaiveDate, now: NaiveDateTime) -> String {
    let today = now.date();
    if date == today {
        "today".to_string()
    } else if today.pred_opt() == Some(date) {
        "yesterday".to_string()
    } else {
        date.format("%A, %d/%m/%Y").to_string()
    }
}

fn resolve_window(
    token: PeriodToken,
    day: Option<NaiveDate>,
    range: Option<ExplicitRange>,
    now: NaiveDateTime,
) -> DateRange {
    if day.is_some() || range.is_some() {
        period::resolve_explicit(now, day, range.map(|r| r.start), range.map(|r| r.end))
    } else {
        period::resolve(token, now)
    }
}

fn window_label(token: PeriodToken, day: Option<NaiveDate>, range: Option<ExplicitRange>) -> String {
    if let Some(d) = day {
        return format!("on {}", d.format("%d/%m/%Y"));
    }
    if let Some(r) = range {
        return format!(
            "from {} to {}",
            r.start.format("%d/%m/%Y"),
            r.end.format("%d/%m/%Y")
        );
    }
    token.label().to_string()
}

fn group_by_category(txs: &[TransactionRecord]) -> BTreeMap<String, CategoryTotals> {
    let mut map: BTreeMap<String, CategoryTotals> = BTreeMap::new();
    for tx in txs {
        let entry = map.entry(tx.category.clone()).or_default();
        match tx.kind {
            TxKind::Income => entry.income += tx.amount,
            TxKind::Expense => entry.expense += tx.amount,
        }
    }
    map
}

fn describe(description: &str) -> &str {
    if description.trim().is_empty() {
        "(no description)"
    } else {
        description
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(50.0, 100.0), 50.0);
        assert_eq!(percent_change(-25.0, 100.0), -25.0);
        assert_eq!(percent_change(150.0, 0.0), 0.0);
    }

    #[test]
    fn test_date_labels() {
        let now = NaiveDate::from_ymd_opt(2025, 7, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(date_label(now.date(), now), "today");
        assert_eq!(
            date_label(NaiveDate::from_ymd_opt(2025, 7, 14).unwrap(), now),
            "yesterday"
        );
        assert_eq!(
            date_label(NaiveDate::from_ymd_opt(2025, 7, 4).unwrap(), now),
            "Friday, 04/07/2025"
        );
    }
}
