//! LLM client used by the iterative agent and answer generator.
//!
//! A thin `reqwest`-based chat-completion client, following the same
//! retry/backoff shape as `embedding::HttpEmbedder`. Configured from
//! `OPENAI_API_KEY`, `MODEL`, `BASE_URL`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LlmError, LlmResult};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Implemented by any chat-completion backend. `chat` sends the full message
/// list and returns the raw assistant text (callers parse JSON defensively).
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, system: &str, user: &str, timeout: Duration) -> LlmResult<String>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpLlmClient {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self { client: reqwest::Client::new(), base_url, api_key, model }
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn chat(&self, system: &str, user: &str, timeout: Duration) -> LlmResult<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: 0.0,
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .timeout(timeout)
                .send()
                .await;

            match sent {
                Ok(response) if response.status().is_success() => {
                    let parsed: ChatResponse = response
                        .json()
                        .await
                        .map_err(|e| LlmError::Persistent(e.to_string()))?;
                    return Ok(parsed
                        .choices
                        .into_iter()
                        .next()
                        .map(|c| c.message.content)
                        .unwrap_or_default());
                }
                Ok(response) if response.status().is_server_error() && attempt < MAX_ATTEMPTS => {
                    tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt - 1)).await;
                    continue;
                }
                Ok(response) => {
                    return Err(LlmError::Persistent(format!("llm endpoint returned {}", response.status())));
                }
                Err(e) if e.is_timeout() => return Err(LlmError::Timeout(timeout)),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    tokio::time::sleep(BASE_BACKOFF * 2u32.pow(attempt - 1)).await;
                    continue;
                }
                Err(e) => return Err(LlmError::Persistent(e.to_string())),
            }
        }
    }
}

/// Planning output from the agent's LLM call. Parsed defensively: unknown
/// fields ignored, missing fields defaulted, malformed JSON treated as an
/// empty `tool_calls` list with `confidence = 0`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentPlan {
    #[serde(default)]
    pub confidence: u8,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl AgentPlan {
    /// Never panics: malformed JSON becomes an empty, zero-confidence plan.
    pub fn parse_defensively(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or(AgentPlan { confidence: 0, reasoning: String::new(), tool_calls: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_json_yields_empty_plan() {
        let plan = AgentPlan::parse_defensively("not json at all");
        assert_eq!(plan.confidence, 0);
        assert!(plan.tool_calls.is_empty());
    }

    #[test]
    fn missing_fields_default() {
        let plan = AgentPlan::parse_defensively(r#"{"confidence": 95}"#);
        assert_eq!(plan.confidence, 95);
        assert!(plan.tool_calls.is_empty());
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let plan = AgentPlan::parse_defensively(
            r#"{"confidence": 50, "tool_calls": [], "extra_field": "ignored"}"#,
        );
        assert_eq!(plan.confidence, 50);
    }
}
