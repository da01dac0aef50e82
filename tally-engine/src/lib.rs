//! tally-engine: turns chat messages into ledger operations and replies.
//!
//! The pure interpretation logic lives in `tally-core`; this crate adds the
//! async surface around it: collaborator traits, the language-model
//! client, intent resolution, query execution, and the per-message bot
//! flow. All collaborators are trait objects so deployments (and tests)
//! choose their own backing.

pub mod bot;
pub mod context;
pub mod executor;
pub mod intent;
pub mod llm;
pub mod mem;
pub mod store;

pub use bot::{Bot, InboundBody, InboundMessage};
pub use context::ContextBuilder;
pub use executor::{FinancialSnapshot, QueryExecutor, QueryOutcome};
pub use intent::Resolution;
pub use llm::{ChatOutcome, ChatTurn, LanguageModel, OpenAiClient, ToolCall, ToolSpec};
pub use store::{
    BalanceSummary, CategoryRecord, ChatTransport, ConversationTurn, HistoryStore, LedgerStore,
    MessageSource, NewTransaction, Transcriber, TransactionRecord, User, UserDirectory,
};
