//! Language-model seam and the OpenAI-compatible chat client.
//!
//! The engine only needs one call shape: system prompt + prior turns +
//! an optional set of callable tools, answered with either free text or a
//! single tool call. Anything speaking that shape can stand in for the
//! hosted model (tests use a scripted one).

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

/// One prior exchange turn, OpenAI role conventions ("user"/"assistant").
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        ChatTurn {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatTurn {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// A callable operation offered to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub name: String,
    /// Raw argument JSON as the model produced it; decoding happens (and
    /// may recoverably fail) at the intent boundary.
    pub arguments: String,
}

/// What a completion came back as.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatOutcome {
    Text(String),
    Call(ToolCall),
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        turns: &[ChatTurn],
        tools: &[ToolSpec],
    ) -> Result<ChatOutcome>;
}

const OPENAI_BASE_URL: &str = "https://api.openai.com";

/// Extraction, not creative writing: keep the model close to deterministic.
const TEMPERATURE: f32 = 0.2;

#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        OpenAiClient {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Point at a compatible non-OpenAI endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        system: &str,
        turns: &[ChatTurn],
        tools: &[ToolSpec],
    ) -> Result<ChatOutcome> {
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
            tool_calls: Option<Vec<ToolCallOut>>,
        }

        #[derive(Deserialize)]
        struct ToolCallOut {
            function: FunctionOut,
        }

        #[derive(Deserialize)]
        struct FunctionOut {
            name: String,
            arguments: String,
        }

        let mut messages = vec![json!({ "role": "system", "content": system })];
        for t in turns {
            messages.push(json!({ "role": t.role, "content": t.content }));
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": TEMPERATURE,
        });
        if !tools.is_empty() {
            let specs: Vec<serde_json::Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(specs);
            body["tool_choice"] = json!("auto");
        }

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("chat completion request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("chat completion error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse chat completion response")?;
        let Some(choice) = out.choices.into_iter().next() else {
            bail!("chat completion returned no choices");
        };

        if let Some(calls) = choice.message.tool_calls {
            if let Some(call) = calls.into_iter().next() {
                return Ok(ChatOutcome::Call(ToolCall {
                    name: call.function.name,
                    arguments: call.function.arguments,
                }));
            }
        }

        Ok(ChatOutcome::Text(
            choice.message.content.unwrap_or_default().trim().to_string(),
        ))
    }
}
