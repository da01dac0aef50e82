//! In-memory collaborator implementations, used by the test suite and the
//! local REPL. Real deployments swap these for database/provider-backed
//! implementations of the same traits.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;

use tally_core::{DateRange, TxKind};

use crate::store::{
    BalanceSummary, CategoryRecord, ChatTransport, ConversationTurn, HistoryStore, LedgerStore,
    MessageSource, NewTransaction, Transcriber, TransactionRecord, User, UserDirectory,
};

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Fixed set of known users.
#[derive(Default)]
pub struct MemDirectory {
    users: Vec<User>,
}

impl MemDirectory {
    pub fn new(users: Vec<User>) -> Self {
        MemDirectory { users }
    }
}

#[async_trait]
impl UserDirectory for MemDirectory {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>> {
        Ok(self.users.iter().find(|u| u.phone == phone).cloned())
    }

    async fn find_by_phone_like(&self, pattern: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.phone.contains(pattern) || pattern.contains(u.phone.as_str()))
            .cloned())
    }
}

#[derive(Default)]
struct LedgerState {
    categories: Vec<CategoryRecord>,
    transactions: Vec<TransactionRecord>,
    next_category_id: i64,
    next_transaction_id: i64,
}

#[derive(Default)]
pub struct MemLedger {
    state: Mutex<LedgerState>,
}

#[async_trait]
impl LedgerStore for MemLedger {
    async fn create_transaction(&self, tx: NewTransaction) -> Result<TransactionRecord> {
        let mut state = lock(&self.state);
        state.next_transaction_id += 1;
        let category = state
            .categories
            .iter()
            .find(|c| c.id == tx.category_id)
            .map(|c| c.name.clone())
            .unwrap_or_default();
        let record = TransactionRecord {
            id: state.next_transaction_id,
            user_id: tx.user_id,
            category_id: tx.category_id,
            category,
            kind: tx.kind,
            amount: tx.amount,
            description: tx.description,
            date: tx.date,
            source: tx.source,
        };
        state.transactions.push(record.clone());
        Ok(record)
    }

    async fn get_balance(&self, user_id: i64, range: &DateRange) -> Result<BalanceSummary> {
        let state = lock(&self.state);
        let mut income = 0.0;
        let mut expense = 0.0;
        for tx in state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id && range.contains_day(t.date))
        {
            match tx.kind {
                TxKind::Income => income += tx.amount,
                TxKind::Expense => expense += tx.amount,
            }
        }
        Ok(BalanceSummary {
            income,
            expense,
            balance: income - expense,
        })
    }

    async fn get_transactions(
        &self,
        user_id: i64,
        kind: Option<TxKind>,
        range: Option<&DateRange>,
        category: Option<&str>,
    ) -> Result<Vec<TransactionRecord>> {
        let state = lock(&self.state);
        let mut out: Vec<TransactionRecord> = state
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .filter(|t| kind.is_none_or(|k| t.kind == k))
            .filter(|t| range.is_none_or(|r| r.contains_day(t.date)))
            .filter(|t| category.is_none_or(|c| t.category.eq_ignore_ascii_case(c)))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn get_or_create_category(&self, name: &str, kind: TxKind) -> Result<CategoryRecord> {
        let mut state = lock(&self.state);
        if let Some(existing) = state
            .categories
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Ok(existing.clone());
        }
        state.next_category_id += 1;
        let record = CategoryRecord {
            id: state.next_category_id,
            name: name.to_string(),
            kind,
        };
        state.categories.push(record.clone());
        Ok(record)
    }
}

#[derive(Default)]
struct UserHistory {
    /// Oldest first.
    turns: Vec<ConversationTurn>,
    summary: Option<String>,
}

#[derive(Default)]
pub struct MemHistory {
    state: Mutex<HashMap<i64, UserHistory>>,
}

impl MemHistory {
    pub async fn turn_count(&self, user_id: i64) -> usize {
        lock(&self.state)
            .get(&user_id)
            .map(|h| h.turns.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl HistoryStore for MemHistory {
    async fn get_recent(&self, user_id: i64, limit: usize) -> Result<Vec<ConversationTurn>> {
        let state = lock(&self.state);
        let Some(history) = state.get(&user_id) else {
            return Ok(Vec::new());
        };
        Ok(history.turns.iter().rev().take(limit).cloned().collect())
    }

    async fn get_summary(&self, user_id: i64) -> Result<Option<String>> {
        Ok(lock(&self.state)
            .get(&user_id)
            .and_then(|h| h.summary.clone()))
    }

    async fn save(
        &self,
        user_id: i64,
        user_message: &str,
        bot_response: &str,
        _source: MessageSource,
    ) -> Result<()> {
        lock(&self.state)
            .entry(user_id)
            .or_default()
            .turns
            .push(ConversationTurn {
                user_message: user_message.to_string(),
                bot_response: bot_response.to_string(),
                created_at: Utc::now().naive_utc(),
            });
        Ok(())
    }

    async fn delete_older_than(&self, user_id: i64, keep: usize) -> Result<()> {
        let mut state = lock(&self.state);
        if let Some(history) = state.get_mut(&user_id) {
            let len = history.turns.len();
            if len > keep {
                history.turns.drain(..len - keep);
            }
        }
        Ok(())
    }

    async fn update_summary(&self, user_id: i64, text: &str, _covered: usize) -> Result<()> {
        lock(&self.state).entry(user_id).or_default().summary = Some(text.to_string());
        Ok(())
    }
}

/// Collects outbound messages instead of delivering them.
#[derive(Default)]
pub struct MemTransport {
    sent: Mutex<Vec<(String, String)>>,
}

impl MemTransport {
    pub fn sent(&self) -> Vec<(String, String)> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl ChatTransport for MemTransport {
    async fn send(&self, to: &str, text: &str) -> Result<bool> {
        lock(&self.sent).push((to.to_string(), text.to_string()));
        Ok(true)
    }

    async fn send_typing(&self, _to: &str) -> Result<()> {
        Ok(())
    }
}

/// Returns a fixed transcription for every audio payload.
pub struct FixedTranscriber {
    pub text: Option<String>,
}

#[async_trait]
impl Transcriber for FixedTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<Option<String>> {
        Ok(self.text.clone())
    }
}
