//! Thin LLM client adapter (§4.L): system prompt + messages + tool
//! schemas in, `{text, tool_calls[], stop_reason, input_tokens,
//! output_tokens, model}` out, with retry bounded by
//! [`sa_domain::config::RetryConfig`].
//!
//! Only one upstream vendor is wired up (Anthropic's Messages API) —
//! the orchestrator depends on the [`traits::LlmClient`] trait, not on
//! this module, so a second vendor is a matter of adding another
//! implementation of the trait.

pub mod anthropic;
pub mod traits;
pub(crate) mod util;

pub use anthropic::AnthropicClient;
pub use traits::{ChatRequest, ChatResponse, LlmClient};
