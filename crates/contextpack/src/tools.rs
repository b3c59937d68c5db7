//! Tool list assembly (§4.E): the active agent's tools, plus any
//! `state_tools` of the current flow state, plus synthetic navigation
//! tools, plus `change_language`.

use sa_domain::config::{AgentConfig, NavigationFlags, SubflowStateConfig};
use sa_domain::tool::ToolDefinition;

pub fn build_tool_list(
    agent: &AgentConfig,
    current_state: Option<&SubflowStateConfig>,
    has_parent: bool,
) -> Vec<ToolDefinition> {
    let mut tools: Vec<ToolDefinition> = agent
        .tools
        .iter()
        .map(|t| ToolDefinition {
            name: t.name.clone(),
            description: t.description.clone(),
            parameters: t.json_schema(),
        })
        .collect();

    if let Some(state) = current_state {
        for t in &state.state_tools {
            tools.push(ToolDefinition {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.json_schema(),
            });
        }
    }

    tools.extend(navigation_tools(agent.navigation_flags, has_parent));
    tools.push(change_language_tool());
    tools
}

fn navigation_tools(flags: NavigationFlags, has_parent: bool) -> Vec<ToolDefinition> {
    let mut tools = Vec::new();
    let empty_schema = || serde_json::json!({"type": "object", "properties": {}, "required": []});

    // go_home is always present for non-root agents, per §4.E.
    if has_parent {
        tools.push(ToolDefinition {
            name: "go_home".into(),
            description: "Return to the root agent, abandoning any in-progress flow.".into(),
            parameters: empty_schema(),
        });
    }
    if has_parent && flags.can_go_up {
        tools.push(ToolDefinition {
            name: "up_one_level".into(),
            description: "Return to the parent agent, abandoning any in-progress flow.".into(),
            parameters: empty_schema(),
        });
    }
    if flags.can_escalate {
        tools.push(ToolDefinition {
            name: "escalate_to_human".into(),
            description: "Hand the conversation off to a human agent.".into(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {"reason": {"type": "string"}},
                "required": [],
            }),
        });
    }
    tools
}

fn change_language_tool() -> ToolDefinition {
    ToolDefinition {
        name: "change_language".into(),
        description: "Change the language the assistant responds in for the rest of the session.".into(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {"language": {"type": "string", "description": "BCP-47-ish language code, e.g. \"en\" or \"es\""}},
            "required": ["language"],
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{ModelConfig, ToolConfig};

    fn agent_with_tools(names: &[&str]) -> AgentConfig {
        AgentConfig {
            config_id: "remittances".into(),
            name: "Remittances".into(),
            description: String::new(),
            parent_agent_id: Some("root".into()),
            model_config: ModelConfig::default(),
            navigation_flags: NavigationFlags::default(),
            tools: names.iter().map(|n| ToolConfig::new_for_test(n)).collect(),
            subflows: vec![],
            response_templates: vec![],
            context_requirements: vec![],
            default_tools: None,
            system_prompt_addition: None,
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn non_root_agent_always_gets_go_home() {
        let agent = agent_with_tools(&["get_exchange_rate"]);
        let tools = build_tool_list(&agent, None, true);
        assert!(tools.iter().any(|t| t.name == "go_home"));
    }

    #[test]
    fn root_agent_has_no_go_home_or_up() {
        let mut agent = agent_with_tools(&["enter_remittances"]);
        agent.parent_agent_id = None;
        let tools = build_tool_list(&agent, None, false);
        assert!(!tools.iter().any(|t| t.name == "go_home"));
        assert!(!tools.iter().any(|t| t.name == "up_one_level"));
    }

    #[test]
    fn change_language_always_present() {
        let agent = agent_with_tools(&[]);
        let tools = build_tool_list(&agent, None, false);
        assert!(tools.iter().any(|t| t.name == "change_language"));
    }

    #[test]
    fn escalation_respects_flag() {
        let mut agent = agent_with_tools(&[]);
        agent.navigation_flags.can_escalate = false;
        let tools = build_tool_list(&agent, None, true);
        assert!(!tools.iter().any(|t| t.name == "escalate_to_human"));
    }
}
