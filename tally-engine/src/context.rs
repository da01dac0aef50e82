//! Bounded conversation context for the intent resolver.
//!
//! One optional rolling summary plus the last few raw exchanges; history
//! is context, not state. A missing or broken history store just means an
//! empty window.

use std::sync::Arc;

use tracing::warn;

use crate::llm::ChatTurn;
use crate::store::HistoryStore;

/// Raw exchanges included after the summary. Output is bounded by
/// `1 + 2 * RECENT_TURNS` entries.
pub const RECENT_TURNS: usize = 5;

#[derive(Clone)]
pub struct ContextBuilder {
    history: Option<Arc<dyn HistoryStore>>,
}

impl ContextBuilder {
    pub fn new(history: Option<Arc<dyn HistoryStore>>) -> Self {
        ContextBuilder { history }
    }

    /// Assemble the context window for one user. Never fails: store errors
    /// degrade to an empty sequence and the caller proceeds context-free.
    pub async fn build(&self, user_id: i64) -> Vec<ChatTurn> {
        let Some(store) = &self.history else {
            return Vec::new();
        };

        let recent = match store.get_recent(user_id, RECENT_TURNS).await {
            Ok(turns) => turns,
            Err(e) => {
                warn!(user_id, error = %e, "conversation history unavailable");
                return Vec::new();
            }
        };

        let mut out = Vec::with_capacity(1 + 2 * recent.len());

        match store.get_summary(user_id).await {
            Ok(Some(summary)) if !summary.trim().is_empty() => {
                out.push(ChatTurn::assistant(format!(
                    "Summary of our earlier conversation: {summary}"
                )));
            }
            Ok(_) => {}
            Err(e) => warn!(user_id, error = %e, "conversation summary unavailable"),
        }

        // Store returns newest first; the model wants oldest first.
        for turn in recent.into_iter().rev() {
            out.push(ChatTurn::user(turn.user_message));
            out.push(ChatTurn::assistant(turn.bot_response));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MemHistory;
    use crate::store::MessageSource;

    #[tokio::test]
    async fn test_no_store_means_no_context() {
        let builder = ContextBuilder::new(None);
        assert!(builder.build(1).await.is_empty());
    }

    #[tokio::test]
    async fn test_window_is_bounded_and_oldest_first() {
        let history = Arc::new(MemHistory::default());
        for i in 0..8 {
            history
                .save(1, &format!("q{i}"), &format!("a{i}"), MessageSource::Text)
                .await
                .unwrap();
        }
        history.update_summary(1, "user tracks groceries", 3).await.unwrap();

        let builder = ContextBuilder::new(Some(history as Arc<dyn HistoryStore>));
        let turns = builder.build(1).await;

        // summary + 5 exchanges
        assert_eq!(turns.len(), 1 + 2 * RECENT_TURNS);
        assert!(turns[0].content.contains("groceries"));
        assert_eq!(turns[1].content, "q3");
        assert_eq!(turns[turns.len() - 1].content, "a7");
    }
}
