//! Intent resolution: one utterance plus bounded context becomes either a
//! structured [`Operation`] or a direct conversational reply.
//!
//! The model sees exactly three callable operations. Its tool-call name
//! picks the variant; the argument JSON is decoded here, and a malformed
//! payload is a recoverable miss (fixed apology), never a crash.

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use tally_core::{
    ComparisonSpec, ExplicitRange, Operation, PeriodToken, QueryKind, QueryOp, RegisterItem,
    TxKind, category,
};

use crate::llm::{ChatOutcome, ChatTurn, LanguageModel, ToolSpec};
use crate::store::User;

pub const REGISTER_ONE: &str = "register_transaction";
pub const REGISTER_MANY: &str = "register_transactions";
pub const QUERY_LEDGER: &str = "query_ledger";

/// Fixed sentence the model is told to use for off-topic requests.
pub const REFUSAL_LINE: &str =
    "I can only help with your finances: recording transactions and answering questions about them.";

/// Reply when the model's structured output can't be decoded.
pub const MALFORMED_REPLY: &str =
    "Sorry, I couldn't process that request. Could you rephrase it?";

/// Outcome of resolving one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Operation(Operation),
    Reply(String),
}

/// System instruction anchoring the model: today's date spelled out (so
/// relative phrases resolve correctly), the user's name, the refusal rule,
/// and an explicit push toward the multi-register tool.
pub fn system_prompt(user: &User, now: NaiveDateTime) -> String {
    format!(
        "You are a personal finance assistant for {name}, chatting over a messaging app.\n\
         Today is {date}.\n\
         Your only job is interpreting messages about the user's money: record their \
         transactions and answer questions about their ledger by calling the provided tools.\n\
         Rules:\n\
         - Amounts are always positive; direction is the kind field (income or expense).\n\
         - Dates are ISO (YYYY-MM-DD). When the user gives no date, omit it.\n\
         - If a message describes MORE THAN ONE transaction (joined by 'and', 'also', \
           'in addition', commas), you MUST use {many} with every item. Missing one \
           silently loses the user's money record.\n\
         - For questions about totals, balances or history, call {query}. Relative \
           phrases like 'last week' map to the period field; exact dates go in \
           start_date/end_date or specific_date.\n\
         - If the message is not about the user's finances, reply exactly: {refusal}\n\
         - Otherwise answer small talk briefly and steer back to finances.",
        name = user.display_name,
        date = now.format("%A, %d %B %Y"),
        many = REGISTER_MANY,
        query = QUERY_LEDGER,
        refusal = REFUSAL_LINE,
    )
}

/// The three callable operations and their argument schemas.
pub fn tool_specs() -> Vec<ToolSpec> {
    let item_schema = json!({
        "type": "object",
        "properties": {
            "amount": { "type": "number", "description": "Positive amount" },
            "kind": { "type": "string", "enum": ["income", "expense"] },
            "category": { "type": "string", "description": "Category name; omit to infer from the description" },
            "description": { "type": "string", "description": "What the money was for" },
            "date": { "type": "string", "description": "ISO date YYYY-MM-DD; omit for today" }
        },
        "required": ["amount", "kind", "description"]
    });

    let window_props = json!({
        "period": {
            "type": "string",
            "enum": ["today", "yesterday", "week", "last_week", "month", "last_month", "year", "last_year", "custom"]
        },
        "start_date": { "type": "string", "description": "ISO date, custom range start" },
        "end_date": { "type": "string", "description": "ISO date, custom range end" },
        "specific_date": { "type": "string", "description": "ISO date for a single-day window" }
    });

    let mut query_props = serde_json::Map::new();
    if let Some(w) = window_props.as_object() {
        query_props.extend(w.clone());
    }
    query_props.insert(
        "kind".to_string(),
        json!({
            "type": "string",
            "enum": ["summary", "expenses", "income", "balance", "detailed"],
            "description": "What to report; summary when unsure"
        }),
    );
    query_props.insert(
        "category".to_string(),
        json!({ "type": "string", "description": "Restrict to one category" }),
    );
    query_props.insert(
        "comparison".to_string(),
        json!({
            "type": "object",
            "description": "A second window to compare against",
            "properties": window_props,
        }),
    );

    vec![
        ToolSpec {
            name: REGISTER_ONE.to_string(),
            description: "Record exactly one financial transaction.".to_string(),
            parameters: item_schema.clone(),
        },
        ToolSpec {
            name: REGISTER_MANY.to_string(),
            description: "Record several transactions mentioned in one message.".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "transactions": { "type": "array", "items": item_schema }
                },
                "required": ["transactions"]
            }),
        },
        ToolSpec {
            name: QUERY_LEDGER.to_string(),
            description: "Answer a question about the user's ledger over a time window, \
                          optionally compared against another window."
                .to_string(),
            parameters: json!({
                "type": "object",
                "properties": serde_json::Value::Object(query_props),
            }),
        },
    ]
}

/// Submit the utterance to the model and interpret its answer.
pub async fn resolve(
    model: &dyn LanguageModel,
    utterance: &str,
    context: &[ChatTurn],
    user: &User,
    now: NaiveDateTime,
) -> Result<Resolution> {
    let system = system_prompt(user, now);
    let mut turns = context.to_vec();
    turns.push(ChatTurn::user(utterance));

    let outcome = model.complete(&system, &turns, &tool_specs()).await?;

    match outcome {
        // A blank completion (null content, no tool calls) must not reach
        // the user as an empty message.
        ChatOutcome::Text(text) if text.trim().is_empty() => {
            warn!("model returned empty content");
            Ok(Resolution::Reply(MALFORMED_REPLY.to_string()))
        }
        ChatOutcome::Text(text) => Ok(Resolution::Reply(text)),
        ChatOutcome::Call(call) => match decode_call(&call.name, &call.arguments, now) {
            Ok(op) => {
                debug!(tool = %call.name, "decoded operation");
                Ok(Resolution::Operation(op))
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "undecodable tool arguments");
                Ok(Resolution::Reply(MALFORMED_REPLY.to_string()))
            }
        },
    }
}

// --- wire forms the model actually emits ---

#[derive(Debug, Deserialize)]
struct TxArgs {
    amount: f64,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct ManyArgs {
    transactions: Vec<TxArgs>,
}

#[derive(Debug, Deserialize)]
struct WindowArgs {
    #[serde(default)]
    period: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
    #[serde(default)]
    end_date: Option<NaiveDate>,
    #[serde(default)]
    specific_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    #[serde(flatten)]
    window: WindowArgs,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    comparison: Option<WindowArgs>,
}

/// Map a tool-call name + argument JSON onto the closed Operation enum.
/// This is the single boundary where the model's output is trusted as data.
pub fn decode_call(name: &str, arguments: &str, now: NaiveDateTime) -> Result<Operation> {
    match name {
        REGISTER_ONE => {
            let args: TxArgs = serde_json::from_str(arguments)?;
            Ok(Operation::RegisterOne(into_item(args, now)?))
        }
        REGISTER_MANY => {
            let args: ManyArgs = serde_json::from_str(arguments)?;
            if args.transactions.is_empty() {
                anyhow::bail!("register_transactions with no items");
            }
            let items = args
                .transactions
                .into_iter()
                .map(|a| into_item(a, now))
                .collect::<Result<Vec<_>>>()?;
            Ok(Operation::RegisterMany(items))
        }
        QUERY_LEDGER => {
            let args: QueryArgs = serde_json::from_str(arguments)?;
            Ok(Operation::Query(into_query(args)))
        }
        other => anyhow::bail!("unknown tool: {other}"),
    }
}

fn into_item(args: TxArgs, now: NaiveDateTime) -> Result<RegisterItem> {
    if !(args.amount > 0.0) {
        anyhow::bail!("amount must be positive, got {}", args.amount);
    }
    let kind = args.kind.as_deref().map(TxKind::parse).unwrap_or(TxKind::Expense);
    let category = match args.category {
        Some(c) if !c.trim().is_empty() => c,
        _ => category::infer(&args.description, kind).to_string(),
    };
    Ok(RegisterItem {
        amount: args.amount,
        kind,
        category,
        description: args.description,
        date: args.date.unwrap_or_else(|| now.date()),
    })
}

fn into_query(args: QueryArgs) -> QueryOp {
    let (period, day, range) = window_parts(&args.window);
    QueryOp {
        period,
        kind: args.kind.as_deref().map(QueryKind::parse).unwrap_or_default(),
        category: args.category,
        day,
        range,
        comparison: args.comparison.as_ref().map(|w| {
            let (period, day, range) = window_parts(w);
            ComparisonSpec { period, day, range }
        }),
    }
}

fn window_parts(w: &WindowArgs) -> (PeriodToken, Option<NaiveDate>, Option<ExplicitRange>) {
    let range = match (w.start_date, w.end_date) {
        (Some(start), Some(end)) => Some(ExplicitRange { start, end }),
        _ => None,
    };
    let period = if w.specific_date.is_some() || range.is_some() {
        PeriodToken::Custom
    } else {
        w.period.as_deref().map(PeriodToken::parse).unwrap_or_default()
    };
    (period, w.specific_date, range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 7, 15)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn demo_user() -> User {
        User {
            id: 1,
            display_name: "Ana".to_string(),
            phone: "+15550100".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_prompt_carries_date_and_name() {
        let p = system_prompt(&demo_user(), now());
        assert!(p.contains("Tuesday, 15 July 2025"));
        assert!(p.contains("Ana"));
        assert!(p.contains(REFUSAL_LINE));
    }

    #[test]
    fn test_decode_register_one() {
        let args = r#"{"amount": 50.0, "kind": "expense", "description": "lunch"}"#;
        let op = decode_call(REGISTER_ONE, args, now()).unwrap();
        match op {
            Operation::RegisterOne(item) => {
                assert_eq!(item.amount, 50.0);
                assert_eq!(item.kind, TxKind::Expense);
                assert_eq!(item.category, "Food");
                assert_eq!(item.date, now().date());
            }
            other => panic!("expected RegisterOne, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_register_many() {
        let args = r#"{"transactions": [
            {"amount": 500, "kind": "expense", "description": "tires"},
            {"amount": 200, "kind": "expense", "description": "bodywork"}
        ]}"#;
        let op = decode_call(REGISTER_MANY, args, now()).unwrap();
        match op {
            Operation::RegisterMany(items) => {
                assert_eq!(items.len(), 2);
                assert!(items.iter().all(|i| i.kind == TxKind::Expense));
            }
            other => panic!("expected RegisterMany, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_query_with_comparison() {
        let args = r#"{"period": "month", "kind": "expenses",
                       "comparison": {"period": "last_month"}}"#;
        let op = decode_call(QUERY_LEDGER, args, now()).unwrap();
        match op {
            Operation::Query(q) => {
                assert_eq!(q.period, PeriodToken::Month);
                assert_eq!(q.kind, QueryKind::Expenses);
                let cmp = q.comparison.unwrap();
                assert_eq!(cmp.period, PeriodToken::LastMonth);
            }
            other => panic!("expected Query, got {other:?}"),
        }
    }

    #[test]
    fn test_explicit_dates_select_custom_period() {
        let args = r#"{"start_date": "2025-06-01", "end_date": "2025-06-10", "kind": "balance"}"#;
        let op = decode_call(QUERY_LEDGER, args, now()).unwrap();
        match op {
            Operation::Query(q) => {
                assert_eq!(q.period, PeriodToken::Custom);
                let r = q.range.unwrap();
                assert_eq!(r.start, NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
            }
            other => panic!("expected Query, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_arguments_are_an_error_not_a_panic() {
        assert!(decode_call(REGISTER_ONE, "{not json", now()).is_err());
        assert!(decode_call(REGISTER_ONE, r#"{"amount": -3, "description": "x"}"#, now()).is_err());
        assert!(decode_call("open_the_pod_bay_doors", "{}", now()).is_err());
    }

    #[test]
    fn test_unknown_period_degrades_to_today() {
        let args = r#"{"period": "fortnight"}"#;
        let op = decode_call(QUERY_LEDGER, args, now()).unwrap();
        match op {
            Operation::Query(q) => assert_eq!(q.period, PeriodToken::Today),
            other => panic!("expected Query, got {other:?}"),
        }
    }
}
