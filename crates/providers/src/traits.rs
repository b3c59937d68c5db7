use sa_domain::tool::{Message, ToolCall, ToolDefinition, Usage};
use sa_domain::Result;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types (§4.L)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A chat completion request: system prompt, ordered messages, optional
/// tool schemas, model/temperature/max-tokens.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The system prompt, assembled by the context assembler (§4.E).
    pub system: String,
    /// The conversation messages to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens in the response.
    pub max_tokens: u32,
    /// Model identifier. Falls back to the provider's configured default
    /// when empty.
    pub model: String,
}

/// A chat completion response: text, zero or more tool calls, and usage.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
    pub usage: Usage,
    pub model: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core client trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A chat-completions adapter over an upstream LLM vendor. Implementations
/// own their own retry policy (exponential backoff on rate-limit,
/// connection errors, and upstream 5xx; never on 4xx).
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse>;
}
