//! Builds each of the nine ordered system-prompt sections (§4.E). Every
//! section is truncated independently against its own token budget before
//! being joined; a section that resolves to nothing contributes nothing
//! (no empty headers).

use crate::tokens::truncate_to_tokens;
use sa_domain::config::{AgentConfig, NavigationFlags};
use sa_domain::session::{CompactedHistory, CurrentFlow, PendingConfirmation, UserContext};
use std::collections::HashMap;

/// One assembled section plus whether its own budget truncated it.
pub struct Section {
    pub text: String,
    pub truncated: bool,
}

fn budget(text: String, max_tokens: usize) -> Section {
    let (text, truncated) = truncate_to_tokens(&text, max_tokens);
    Section { text, truncated }
}

/// §4.E §1 — base system prompt, already localised by the caller.
pub fn base_prompt(localised_prompt: &str, max_tokens: usize) -> Section {
    budget(localised_prompt.to_string(), max_tokens)
}

/// §4.E §2 — current agent description + `system_prompt_addition`.
pub fn agent_block(agent: &AgentConfig, max_tokens: usize) -> Section {
    let mut text = format!("You are {}. {}", agent.name, agent.description);
    if let Some(addition) = &agent.system_prompt_addition {
        text.push(' ');
        text.push_str(addition);
    }
    budget(text, max_tokens)
}

/// §4.E §3 — user profile block (name, preferred name).
pub fn user_profile_block(user: Option<&UserContext>, max_tokens: usize) -> Option<Section> {
    let user = user?;
    let display_name = user
        .profile
        .preferred_name
        .as_deref()
        .or(user.profile.name.as_deref())?;
    Some(budget(
        format!("The user's name is {display_name}. Address them by it when natural."),
        max_tokens,
    ))
}

/// §4.E §4 — product-specific context block, only when the active agent
/// maps to a product summary by its `config_id`.
pub fn product_context_block(user: Option<&UserContext>, agent: &AgentConfig, max_tokens: usize) -> Option<Section> {
    let user = user?;
    let summary = user.product_summaries.get(&agent.config_id)?;
    Some(budget(
        format!("Known {} context: {summary}", agent.config_id),
        max_tokens,
    ))
}

/// §4.E §5 — compacted history summary, if present.
pub fn compacted_history_block(history: Option<&CompactedHistory>, max_tokens: usize) -> Option<Section> {
    let history = history?;
    if history.compacted_text.trim().is_empty() {
        return None;
    }
    Some(budget(
        format!("Summary of earlier conversation: {}", history.compacted_text),
        max_tokens,
    ))
}

/// §4.E §6 — current flow-state block: flow id, state id, instructions,
/// and the flow data collected so far.
pub fn flow_state_block(
    flow: Option<&CurrentFlow>,
    agent_instructions: Option<&str>,
    max_tokens: usize,
) -> Option<Section> {
    let flow = flow?;
    let mut text = format!(
        "You are inside flow \"{}\", state \"{}\".",
        flow.flow_config_id, flow.current_state_id
    );
    if let Some(instructions) = agent_instructions {
        if !instructions.is_empty() {
            text.push(' ');
            text.push_str(instructions);
        }
    }
    if !flow.state_data.is_empty() {
        text.push_str(" Data collected so far: ");
        text.push_str(&render_state_data(&flow.state_data));
    }
    Some(budget(text, max_tokens))
}

fn render_state_data(data: &HashMap<String, serde_json::Value>) -> String {
    let mut keys: Vec<&String> = data.keys().collect();
    keys.sort();
    keys.iter()
        .map(|k| format!("{k}={}", data[*k]))
        .collect::<Vec<_>>()
        .join(", ")
}

/// §4.E §7 — pending confirmation block, if one exists.
pub fn pending_confirmation_block(pending: Option<&PendingConfirmation>, max_tokens: usize) -> Option<Section> {
    let pending = pending?;
    Some(budget(
        format!(
            "A confirmation is pending for tool \"{}\": \"{}\". Wait for the user's yes/no before doing anything else.",
            pending.tool_name, pending.display_message
        ),
        max_tokens,
    ))
}

/// §4.E §8 — navigation instructions, a function of the agent's
/// navigation flags and whether it has a parent.
pub fn navigation_instructions_block(flags: NavigationFlags, has_parent: bool, max_tokens: usize) -> Option<Section> {
    let mut lines = Vec::new();
    if has_parent && flags.can_go_up {
        lines.push("call up_one_level to return to the previous agent");
    }
    if has_parent && flags.can_go_home {
        lines.push("call go_home to return to the root agent");
    }
    if flags.can_escalate {
        lines.push("call escalate_to_human if the user asks for a human");
    }
    if lines.is_empty() {
        return None;
    }
    Some(budget(format!("Navigation: you may {}.", lines.join("; ")), max_tokens))
}

/// §4.E §9 — language directive, appended last to reinforce output
/// language regardless of how much of the budget above was consumed.
pub fn language_directive(language: &str) -> Section {
    Section {
        text: format!("Respond to the user in language code \"{language}\" unless they explicitly switch."),
        truncated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sa_domain::session::UserProfile;

    #[test]
    fn user_profile_block_prefers_preferred_name() {
        let user = UserContext {
            user_id: "u1".into(),
            profile: UserProfile {
                name: Some("Ana Maria".into()),
                preferred_name: Some("Ana".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let section = user_profile_block(Some(&user), 500).unwrap();
        assert!(section.text.contains("Ana"));
        assert!(!section.text.contains("Ana Maria"));
    }

    #[test]
    fn user_profile_block_absent_without_name() {
        let user = UserContext {
            user_id: "u1".into(),
            ..Default::default()
        };
        assert!(user_profile_block(Some(&user), 500).is_none());
    }

    #[test]
    fn compacted_history_block_absent_when_empty() {
        let history = CompactedHistory {
            user_id: "u1".into(),
            compacted_text: "   ".into(),
            last_compacted_at: Utc::now(),
        };
        assert!(compacted_history_block(Some(&history), 500).is_none());
    }

    #[test]
    fn navigation_block_respects_flags_and_parent() {
        let flags = NavigationFlags {
            can_go_up: true,
            can_go_home: true,
            can_escalate: false,
        };
        let section = navigation_instructions_block(flags, true, 500).unwrap();
        assert!(section.text.contains("up_one_level"));
        assert!(section.text.contains("go_home"));
        assert!(!section.text.contains("escalate_to_human"));
    }

    #[test]
    fn navigation_block_absent_at_root_with_no_escalation() {
        let flags = NavigationFlags {
            can_go_up: true,
            can_go_home: true,
            can_escalate: false,
        };
        assert!(navigation_instructions_block(flags, false, 500).is_none());
    }

    #[test]
    fn language_directive_is_never_truncated_away() {
        let section = language_directive("es");
        assert!(section.text.contains("es"));
        assert!(!section.truncated);
    }
}
