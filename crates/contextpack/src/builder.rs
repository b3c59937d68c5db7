//! The context assembler (§4.E): composes the nine ordered system-prompt
//! sections and the provider-ready message/tool lists under per-section
//! token budgets.

use crate::messages;
use crate::sections;
use crate::tools::build_tool_list;
use sa_domain::config::{AgentConfig, ContextConfig, SubflowStateConfig};
use sa_domain::session::{CompactedHistory, ConversationMessage, CurrentFlow, PendingConfirmation, UserContext};
use sa_domain::tool::{Message, ToolDefinition};

/// Everything the assembler needs to produce one turn's LLM request
/// package. Borrowed for the duration of one call; the assembler itself
/// holds no session state.
pub struct AssembleInput<'a> {
    pub base_system_prompt: &'a str,
    pub agent: &'a AgentConfig,
    pub has_parent: bool,
    pub user_context: Option<&'a UserContext>,
    pub compacted_history: Option<&'a CompactedHistory>,
    pub current_flow: Option<&'a CurrentFlow>,
    pub current_state: Option<&'a SubflowStateConfig>,
    pub pending_confirmation: Option<&'a PendingConfirmation>,
    pub recent_messages: &'a [ConversationMessage],
    pub language: &'a str,
}

/// The complete request package handed to the LLM client (§4.E).
pub struct AssembledContext {
    pub system_prompt: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

pub struct ContextAssembler {
    config: ContextConfig,
}

impl ContextAssembler {
    pub fn new(config: ContextConfig) -> Self {
        Self { config }
    }

    pub fn assemble(&self, input: AssembleInput<'_>) -> AssembledContext {
        let c = &self.config;
        let mut parts: Vec<String> = Vec::new();

        let base = sections::base_prompt(input.base_system_prompt, c.system_tokens);
        push_nonempty(&mut parts, base.text);

        let agent_section = sections::agent_block(input.agent, c.system_tokens);
        push_nonempty(&mut parts, agent_section.text);

        if let Some(s) = sections::user_profile_block(input.user_context, c.user_tokens) {
            push_nonempty(&mut parts, s.text);
        }
        if let Some(s) = sections::product_context_block(input.user_context, input.agent, c.product_tokens) {
            push_nonempty(&mut parts, s.text);
        }
        if let Some(s) = sections::compacted_history_block(input.compacted_history, c.compacted_tokens) {
            push_nonempty(&mut parts, s.text);
        }
        if let Some(s) = sections::flow_state_block(
            input.current_flow,
            input.current_state.map(|s| s.agent_instructions.as_str()),
            c.state_tokens,
        ) {
            push_nonempty(&mut parts, s.text);
        }
        if let Some(s) = sections::pending_confirmation_block(input.pending_confirmation, c.state_tokens) {
            push_nonempty(&mut parts, s.text);
        }
        if let Some(s) =
            sections::navigation_instructions_block(input.agent.navigation_flags, input.has_parent, c.system_tokens)
        {
            push_nonempty(&mut parts, s.text);
        }
        // Language directive is appended last, unbudgeted, to reinforce
        // output language regardless of how the sections above truncated.
        push_nonempty(&mut parts, sections::language_directive(input.language).text);

        let system_prompt = parts.join("\n\n");
        let chat_messages = messages::to_chat_messages(input.recent_messages, c.recent_messages_tokens);
        let tools = build_tool_list(input.agent, input.current_state, input.has_parent);

        AssembledContext {
            system_prompt,
            messages: chat_messages,
            tools,
            model: input.agent.model_config.model.clone(),
            temperature: input.agent.model_config.temperature as f32,
            max_tokens: input.agent.model_config.max_tokens,
        }
    }
}

fn push_nonempty(parts: &mut Vec<String>, text: String) {
    if !text.trim().is_empty() {
        parts.push(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{ModelConfig, NavigationFlags};

    fn minimal_agent() -> AgentConfig {
        AgentConfig {
            config_id: "root".into(),
            name: "Root Assistant".into(),
            description: "the top-level concierge agent".into(),
            parent_agent_id: None,
            model_config: ModelConfig::default(),
            navigation_flags: NavigationFlags::default(),
            tools: vec![],
            subflows: vec![],
            response_templates: vec![],
            context_requirements: vec![],
            default_tools: None,
            system_prompt_addition: None,
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn assembles_minimal_context_without_panicking() {
        let agent = minimal_agent();
        let assembler = ContextAssembler::new(ContextConfig::default());
        let out = assembler.assemble(AssembleInput {
            base_system_prompt: "You are a helpful banking assistant.",
            agent: &agent,
            has_parent: false,
            user_context: None,
            compacted_history: None,
            current_flow: None,
            current_state: None,
            pending_confirmation: None,
            recent_messages: &[],
            language: "en",
        });
        assert!(out.system_prompt.contains("Root Assistant"));
        assert!(out.system_prompt.ends_with("unless they explicitly switch."));
        assert_eq!(out.model, "claude-sonnet-4-5-20250929");
        assert!(out.tools.iter().any(|t| t.name == "change_language"));
    }
}
