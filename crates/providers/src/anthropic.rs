//! Anthropic Messages API adapter — the one upstream vendor this engine
//! speaks to. Tool schemas, multi-turn history, and tool-result messages
//! map onto Anthropic's content-block model; system messages are pulled
//! out into the top-level `system` field the API expects.

use crate::traits::{ChatRequest, ChatResponse, LlmClient};
use crate::util::{from_reqwest, resolve_api_key};
use sa_domain::config::{ProviderConfig, RetryConfig};
use sa_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall, ToolDefinition, Usage};
use sa_domain::{Error, Result};
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    auth_header: String,
    default_model: String,
    retry: RetryConfig,
    client: reqwest::Client,
}

impl AnthropicClient {
    /// Build a client from the LLM provider configuration. `timeout_ms` is
    /// `llm.timeouts.llm_ms` (§5) — the per-request HTTP timeout.
    pub fn from_config(cfg: &ProviderConfig, retry: RetryConfig, timeout_ms: u64) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(timeout_ms))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            auth_header: cfg.auth.header.clone(),
            default_model: cfg.default_model.clone(),
            retry,
            client,
        })
    }

    fn build_body(&self, req: &ChatRequest) -> Value {
        let model = if req.model.is_empty() {
            self.default_model.clone()
        } else {
            req.model.clone()
        };

        let api_messages: Vec<Value> = req.messages.iter().map(message_to_anthropic).collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "max_tokens": if req.max_tokens > 0 { req.max_tokens } else { 4096 },
            "temperature": req.temperature,
        });

        if !req.system.is_empty() {
            body["system"] = Value::String(req.system.clone());
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }

    /// A single non-retried HTTP round trip. Errors are classified by the
    /// caller so only transient failures are retried.
    async fn send_once(&self, body: &Value) -> std::result::Result<ChatResponse, AttemptError> {
        let url = format!("{}/v1/messages", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header(&self.auth_header, &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AttemptError::Transient(from_reqwest(e))
                } else {
                    AttemptError::Fatal(from_reqwest(e))
                }
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| AttemptError::Fatal(from_reqwest(e)))?;

        if status.as_u16() == 429 || status.is_server_error() {
            return Err(AttemptError::Transient(Error::Http(format!(
                "HTTP {} from Anthropic: {text}",
                status.as_u16()
            ))));
        }
        if !status.is_success() {
            return Err(AttemptError::Fatal(Error::Http(format!(
                "HTTP {} from Anthropic: {text}",
                status.as_u16()
            ))));
        }

        let parsed: Value = serde_json::from_str(&text).map_err(|e| AttemptError::Fatal(Error::Json(e)))?;
        Ok(parse_response(&parsed))
    }
}

enum AttemptError {
    /// Rate-limit, connection error, or upstream 5xx — retried.
    Transient(Error),
    /// 4xx (other than 429) or a malformed response — never retried.
    Fatal(Error),
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse> {
        let body = self.build_body(&req);
        let mut last_err = Error::Other("no attempts made".into());

        for attempt in 1..=self.retry.max_attempts {
            match self.send_once(&body).await {
                Ok(resp) => return Ok(resp),
                Err(AttemptError::Fatal(e)) => return Err(e),
                Err(AttemptError::Transient(e)) => {
                    tracing::warn!(attempt, error = %e, "transient LLM failure, retrying");
                    last_err = e;
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(self.retry.delay_for_attempt(attempt)).await;
                    }
                }
            }
        }
        Err(last_err)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message / tool serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn message_to_anthropic(msg: &Message) -> Value {
    match msg.role {
        Role::System => serde_json::json!({"role": "user", "content": msg.content.extract_all_text()}),
        Role::User => serde_json::json!({"role": "user", "content": content_to_blocks(&msg.content)}),
        Role::Assistant => serde_json::json!({"role": "assistant", "content": content_to_blocks(&msg.content)}),
        Role::Tool => serde_json::json!({"role": "user", "content": tool_result_blocks(&msg.content)}),
    }
}

fn content_to_blocks(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Text(t) => vec![serde_json::json!({"type": "text", "text": t})],
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::Text { text } => Some(serde_json::json!({"type": "text", "text": text})),
                ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                    "type": "tool_use",
                    "id": id,
                    "name": name,
                    "input": input,
                })),
                ContentPart::ToolResult { .. } => None,
            })
            .collect(),
    }
}

fn tool_result_blocks(content: &MessageContent) -> Vec<Value> {
    match content {
        MessageContent::Parts(parts) => parts
            .iter()
            .filter_map(|p| match p {
                ContentPart::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => Some(serde_json::json!({
                    "type": "tool_result",
                    "tool_use_id": tool_use_id,
                    "content": content,
                    "is_error": is_error,
                })),
                _ => None,
            })
            .collect(),
        MessageContent::Text(t) => vec![serde_json::json!({
            "type": "tool_result",
            "tool_use_id": "",
            "content": t,
        })],
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

fn parse_response(body: &Value) -> ChatResponse {
    let blocks = body.get("content").and_then(|v| v.as_array()).cloned().unwrap_or_default();

    let mut text_parts = Vec::new();
    let mut tool_calls = Vec::new();
    for block in &blocks {
        match block.get("type").and_then(|v| v.as_str()).unwrap_or("") {
            "text" => {
                if let Some(t) = block.get("text").and_then(|v| v.as_str()) {
                    text_parts.push(t.to_string());
                }
            }
            "tool_use" => {
                let call_id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                let tool_name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                // A malformed / absent `input` decodes to an empty object
                // rather than failing the whole response (§4.L).
                let arguments = block
                    .get("input")
                    .filter(|v| v.is_object())
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Default::default()));
                tool_calls.push(ToolCall {
                    call_id,
                    tool_name,
                    arguments,
                });
            }
            _ => {}
        }
    }

    let model = body.get("model").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let stop_reason = body.get("stop_reason").and_then(|v| v.as_str()).map(|s| match s {
        "end_turn" => "stop".to_string(),
        "tool_use" => "tool_calls".to_string(),
        other => other.to_string(),
    });
    let usage = body
        .get("usage")
        .map(|u| Usage {
            input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
            output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32,
        })
        .unwrap_or_default();

    ChatResponse {
        text: text_parts.join(""),
        tool_calls,
        stop_reason,
        usage,
        model,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_tool_use_blocks() {
        let body = serde_json::json!({
            "model": "claude-sonnet-4-5-20250929",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Let me check that."},
                {"type": "tool_use", "id": "call_1", "name": "get_exchange_rate", "input": {"country": "MX"}},
            ],
            "usage": {"input_tokens": 120, "output_tokens": 40},
        });
        let resp = parse_response(&body);
        assert_eq!(resp.text, "Let me check that.");
        assert_eq!(resp.tool_calls.len(), 1);
        assert_eq!(resp.tool_calls[0].tool_name, "get_exchange_rate");
        assert_eq!(resp.stop_reason.as_deref(), Some("tool_calls"));
        assert_eq!(resp.usage.input_tokens, 120);
        assert_eq!(resp.usage.output_tokens, 40);
    }

    #[test]
    fn missing_tool_input_decodes_to_empty_object() {
        let body = serde_json::json!({
            "model": "m",
            "content": [{"type": "tool_use", "id": "c1", "name": "escalate_to_human"}],
        });
        let resp = parse_response(&body);
        assert_eq!(resp.tool_calls[0].arguments, serde_json::json!({}));
    }

    #[test]
    fn end_turn_maps_to_stop() {
        let body = serde_json::json!({"model": "m", "stop_reason": "end_turn", "content": []});
        assert_eq!(parse_response(&body).stop_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn tool_message_round_trips_as_tool_result_block() {
        let msg = Message::tool_result("call_1", "transfer confirmed");
        let v = message_to_anthropic(&msg);
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"][0]["type"], "tool_result");
        assert_eq!(v["content"][0]["tool_use_id"], "call_1");
    }
}
