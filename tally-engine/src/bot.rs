//! Inbound message handling: authenticate, transcribe, resolve, execute,
//! reply, remember.
//!
//! One call per inbound message, no shared mutable state. Every path after
//! authentication ends in some reply; faults become a generic apology,
//! never a dropped message.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use tracing::{debug, error, warn};

use tally_core::{Operation, rules};

use crate::context::ContextBuilder;
use crate::executor::QueryExecutor;
use crate::intent::{self, Resolution};
use crate::llm::{ChatOutcome, ChatTurn, LanguageModel};
use crate::store::{
    ChatTransport, HistoryStore, LedgerStore, MessageSource, Transcriber, User, UserDirectory,
};

/// Once stored history exceeds this many turns, older ones are compacted.
pub const RETENTION_THRESHOLD: usize = 10;
/// Raw turns kept after compaction.
pub const RETAINED_TURNS: usize = 5;
/// How far back compaction looks when collecting turns to fold in.
const COMPACTION_FETCH: usize = 50;

pub const REPLY_UNKNOWN_NUMBER: &str =
    "Sorry, I don't recognize this number. Please contact support to set up your account.";
pub const REPLY_INACTIVE_ACCOUNT: &str =
    "Your account is inactive. Please contact support to reactivate it.";
pub const REPLY_AUDIO_FAILED: &str =
    "Sorry, I couldn't understand that audio. Try again, or type your message instead.";
pub const REPLY_SOMETHING_WRONG: &str =
    "Something went wrong on my side. Please try again in a moment.";
pub const REPLY_HELP: &str = "I didn't catch that. You can tell me things like:\n\
     - \"spent 50 on lunch\"\n\
     - \"received 3000 from salary\"\n\
     - \"how much did I spend this month?\"\n\
     - \"what's my balance\"";

#[derive(Debug, Clone)]
pub enum InboundBody {
    Text(String),
    Audio(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Sender phone, in whatever format the transport delivered it.
    pub from: String,
    pub body: InboundBody,
}

pub struct Bot {
    directory: Arc<dyn UserDirectory>,
    transport: Arc<dyn ChatTransport>,
    executor: QueryExecutor,
    context: ContextBuilder,
    history: Option<Arc<dyn HistoryStore>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    model: Option<Arc<dyn LanguageModel>>,
}

impl Bot {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        ledger: Arc<dyn LedgerStore>,
        transport: Arc<dyn ChatTransport>,
    ) -> Self {
        Bot {
            directory,
            transport,
            executor: QueryExecutor::new(ledger),
            context: ContextBuilder::new(None),
            history: None,
            transcriber: None,
            model: None,
        }
    }

    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.context = ContextBuilder::new(Some(history.clone()));
        self.history = Some(history);
        self
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    pub fn with_model(mut self, model: Arc<dyn LanguageModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Process one inbound message end to end and return the reply that was
    /// sent. `now` is threaded explicitly so behavior is reproducible.
    pub async fn handle(&self, msg: InboundMessage, now: NaiveDateTime) -> Result<String> {
        let user = match self.authenticate(&msg.from).await {
            Ok(Auth::Known(user)) => user,
            Ok(Auth::Rejected(reply)) => {
                self.deliver(&msg.from, &reply).await;
                return Ok(reply);
            }
            // A broken directory still gets an answer, not silence.
            Err(e) => {
                error!(error = %e, "user lookup failed");
                self.deliver(&msg.from, REPLY_SOMETHING_WRONG).await;
                return Ok(REPLY_SOMETHING_WRONG.to_string());
            }
        };

        if let Err(e) = self.transport.send_typing(&user.phone).await {
            debug!(error = %e, "typing indicator failed");
        }

        // Audio becomes text before resolution; the reply echoes what was
        // heard so the user can confirm it.
        let (utterance, source, echo) = match &msg.body {
            InboundBody::Text(text) => (text.clone(), MessageSource::Text, None),
            InboundBody::Audio(bytes) => match self.transcribe(bytes).await {
                Some(text) => {
                    let echo = format!("You said: \"{text}\"\n\n");
                    (text, MessageSource::Voice, Some(echo))
                }
                None => {
                    self.deliver(&user.phone, REPLY_AUDIO_FAILED).await;
                    return Ok(REPLY_AUDIO_FAILED.to_string());
                }
            },
        };

        let body = match self.respond(&user, &utterance, source, now).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(user_id = user.id, error = %e, "message processing failed");
                REPLY_SOMETHING_WRONG.to_string()
            }
        };
        let reply = match echo {
            Some(prefix) => format!("{prefix}{body}"),
            None => body,
        };

        self.deliver(&user.phone, &reply).await;
        self.remember(&user, &utterance, &reply, source).await;

        Ok(reply)
    }

    /// Resolve the utterance to an operation (LLM if configured, rules
    /// otherwise) and execute it.
    async fn respond(
        &self,
        user: &User,
        utterance: &str,
        source: MessageSource,
        now: NaiveDateTime,
    ) -> Result<String> {
        if let Some(model) = &self.model {
            let context = self.context.build(user.id).await;
            match intent::resolve(model.as_ref(), utterance, &context, user, now).await? {
                Resolution::Reply(text) => Ok(text),
                Resolution::Operation(op) => self.execute(&op, user, source, now).await,
            }
        } else if let Some(item) = rules::parse_transaction(utterance, now) {
            self.execute(&Operation::RegisterOne(item), user, source, now)
                .await
        } else if let Some(query) = rules::parse_query(utterance) {
            self.execute(&Operation::Query(query), user, source, now)
                .await
        } else {
            Ok(REPLY_HELP.to_string())
        }
    }

    async fn execute(
        &self,
        op: &Operation,
        user: &User,
        source: MessageSource,
        now: NaiveDateTime,
    ) -> Result<String> {
        match op {
            Operation::RegisterOne(item) => {
                self.executor
                    .register(std::slice::from_ref(item), user, now, source)
                    .await
            }
            Operation::RegisterMany(items) => {
                self.executor.register(items, user, now, source).await
            }
            Operation::Query(query) => {
                Ok(self.executor.query(query, user, now).await?.text)
            }
        }
    }

    /// Exact match, then digit-normalized, then substring. Numbers arrive
    /// in inconsistent international formats.
    async fn authenticate(&self, from: &str) -> Result<Auth> {
        let mut found = self
            .directory
            .find_by_phone(from)
            .await
            .context("phone lookup")?;

        let digits = normalize_phone(from);
        if found.is_none() && digits != from {
            found = self
                .directory
                .find_by_phone(&digits)
                .await
                .context("normalized phone lookup")?;
        }
        if found.is_none() && !digits.is_empty() {
            let tail = &digits[digits.len().saturating_sub(8)..];
            found = self
                .directory
                .find_by_phone_like(tail)
                .await
                .context("phone pattern lookup")?;
        }

        Ok(match found {
            None => Auth::Rejected(REPLY_UNKNOWN_NUMBER.to_string()),
            Some(user) if !user.is_active => Auth::Rejected(REPLY_INACTIVE_ACCOUNT.to_string()),
            Some(user) => Auth::Known(user),
        })
    }

    async fn transcribe(&self, audio: &[u8]) -> Option<String> {
        let transcriber = self.transcriber.as_ref()?;
        match transcriber.transcribe(audio).await {
            Ok(Some(text)) if !text.trim().is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "transcription failed");
                None
            }
        }
    }

    /// Delivery is best-effort: a transport hiccup is logged, not fatal.
    async fn deliver(&self, to: &str, text: &str) {
        match self.transport.send(to, text).await {
            Ok(true) => {}
            Ok(false) => warn!(to, "transport declined message"),
            Err(e) => warn!(to, error = %e, "send failed"),
        }
    }

    /// Persist the exchange and compact old history. Nothing here may break
    /// the exchange itself.
    async fn remember(&self, user: &User, utterance: &str, reply: &str, source: MessageSource) {
        let Some(history) = &self.history else {
            return;
        };

        if let Err(e) = history.save(user.id, utterance, reply, source).await {
            warn!(user_id = user.id, error = %e, "history save failed");
            return;
        }

        if let Err(e) = self.compact_history(history, user).await {
            warn!(user_id = user.id, error = %e, "history compaction failed");
        }
    }

    /// Fold turns beyond the retention threshold into the rolling summary,
    /// keeping only the most recent few raw. Needs a model; without one the
    /// history simply grows.
    async fn compact_history(&self, history: &Arc<dyn HistoryStore>, user: &User) -> Result<()> {
        let Some(model) = &self.model else {
            return Ok(());
        };

        let turns = history.get_recent(user.id, COMPACTION_FETCH).await?;
        if turns.len() <= RETENTION_THRESHOLD {
            return Ok(());
        }

        // Newest first from the store; everything past the retained window
        // gets folded in, oldest first.
        let older: Vec<_> = turns[RETAINED_TURNS..].iter().rev().collect();
        let previous = history.get_summary(user.id).await.unwrap_or(None);

        let mut prompt = String::new();
        if let Some(prev) = previous {
            prompt.push_str(&format!("Current summary:\n{prev}\n\n"));
        }
        prompt.push_str("Conversation to fold in:\n");
        for turn in &older {
            prompt.push_str(&format!(
                "User: {}\nAssistant: {}\n",
                turn.user_message, turn.bot_response
            ));
        }

        let system = "You maintain a one-paragraph rolling summary of a finance \
                      chat. Merge the conversation below into the current summary. \
                      Keep amounts, categories and standing requests; drop chit-chat. \
                      Reply with the new summary only.";
        let outcome = model.complete(system, &[ChatTurn::user(prompt)], &[]).await?;

        if let ChatOutcome::Text(summary) = outcome {
            if !summary.trim().is_empty() {
                history
                    .update_summary(user.id, summary.trim(), older.len())
                    .await?;
                history.delete_older_than(user.id, RETAINED_TURNS).await?;
            }
        }
        Ok(())
    }
}

enum Auth {
    Known(User),
    Rejected(String),
}

fn normalize_phone(s: &str) -> String {
    s.chars().filter(char::is_ascii_digit).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("+1 (555) 010-0"), "15550100");
        assert_eq!(normalize_phone("555.0100"), "5550100");
        assert_eq!(normalize_phone("whatsapp:+15550100"), "15550100");
    }

    #[test]
    fn test_rejection_replies_are_distinguishable() {
        assert_ne!(REPLY_UNKNOWN_NUMBER, REPLY_INACTIVE_ACCOUNT);
    }
}
