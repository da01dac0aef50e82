//! Collaborator seams the engine consumes: user directory, ledger store,
//! conversation history, speech-to-text, and the chat transport.
//!
//! Implementations live elsewhere (a real deployment backs these with a
//! database and a messaging provider); [`crate::mem`] ships in-memory
//! versions for tests and the local REPL.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use tally_core::{DateRange, TxKind};

/// A known account holder, resolved once per inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub display_name: String,
    pub phone: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: i64,
    pub name: String,
    pub kind: TxKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub user_id: i64,
    pub category_id: i64,
    pub category: String,
    pub kind: TxKind,
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
    pub source: MessageSource,
}

/// How the originating message arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Text,
    Voice,
}

#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: i64,
    pub category_id: i64,
    pub kind: TxKind,
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
    pub source: MessageSource,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BalanceSummary {
    pub income: f64,
    pub expense: f64,
    pub balance: f64,
}

/// One stored exchange: what the user said and what the bot replied.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationTurn {
    pub user_message: String,
    pub bot_response: String,
    pub created_at: NaiveDateTime,
}

/// Phone-number lookup. Numbers arrive in inconsistent international
/// formats, so the bot tries exact, digit-normalized, and substring lookups
/// in that order.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>>;
    async fn find_by_phone_like(&self, pattern: &str) -> Result<Option<User>>;
}

/// The persistent ledger: transactions, categories, balances.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_transaction(&self, tx: NewTransaction) -> Result<TransactionRecord>;

    async fn get_balance(&self, user_id: i64, range: &DateRange) -> Result<BalanceSummary>;

    /// Transactions for a user, oldest first, optionally filtered.
    async fn get_transactions(
        &self,
        user_id: i64,
        kind: Option<TxKind>,
        range: Option<&DateRange>,
        category: Option<&str>,
    ) -> Result<Vec<TransactionRecord>>;

    /// Idempotent by name: returns the existing category or creates it.
    /// Categories are a shared taxonomy, not scoped per user.
    async fn get_or_create_category(&self, name: &str, kind: TxKind) -> Result<CategoryRecord>;
}

/// Per-user conversation history plus one rolling summary blob.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Most recent turns, newest first.
    async fn get_recent(&self, user_id: i64, limit: usize) -> Result<Vec<ConversationTurn>>;

    async fn get_summary(&self, user_id: i64) -> Result<Option<String>>;

    async fn save(
        &self,
        user_id: i64,
        user_message: &str,
        bot_response: &str,
        source: MessageSource,
    ) -> Result<()>;

    /// Drop everything but the `keep` most recent turns.
    async fn delete_older_than(&self, user_id: i64, keep: usize) -> Result<()>;

    async fn update_summary(&self, user_id: i64, text: &str, covered: usize) -> Result<()>;
}

/// Speech-to-text. `None` signals a failed transcription.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<Option<String>>;
}

/// Outbound chat delivery.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> Result<bool>;
    async fn send_typing(&self, to: &str) -> Result<()>;
}
