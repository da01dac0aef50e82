//! tally-core: pure intent, period, and category logic for the tally ledger bot.
//!
//! Nothing in this crate does I/O. Every function is a deterministic mapping
//! from its inputs (including an explicit `now`) to its outputs, which keeps
//! the whole interpretation layer testable with pinned instants.

pub mod category;
pub mod operation;
pub mod period;
pub mod rules;

pub use category::{DEFAULT_CATEGORY, infer};
pub use operation::{
    ComparisonSpec, ExplicitRange, Operation, QueryKind, QueryOp, RegisterItem, TxKind,
};
pub use period::{DateRange, PeriodToken, resolve, resolve_explicit};
pub use rules::{parse_query, parse_transaction};
