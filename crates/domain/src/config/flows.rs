use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::tools::ToolConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Sub-flows
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A finite state machine scoped to one agent that collects structured
/// data over multiple turns (e.g. the send-money flow).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubflowConfig {
    /// Unique within the owning agent.
    pub config_id: String,
    pub initial_state: String,
    /// Named fields the flow collects. Used by the routing handler to
    /// intersect `start_flow` tool parameters into `state_data`.
    #[serde(default)]
    pub data_schema: HashSet<String>,
    #[serde(default)]
    pub timeout_config: TimeoutConfig,
    pub states: Vec<SubflowStateConfig>,
}

impl SubflowConfig {
    pub fn state(&self, state_id: &str) -> Option<&SubflowStateConfig> {
        self.states.iter().find(|s| s.state_id == state_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "d_timeout_secs")]
    pub idle_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: d_timeout_secs(),
        }
    }
}

fn d_timeout_secs() -> u64 {
    900
}

/// A node of a sub-flow. Contributes instructions to the prompt while
/// active and may restrict which tools are available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubflowStateConfig {
    pub state_id: String,
    #[serde(default)]
    pub name: String,
    /// Injected into the system prompt while this state is active.
    #[serde(default)]
    pub agent_instructions: String,
    /// Additional inline tool schemas available only in this state.
    #[serde(default)]
    pub state_tools: Vec<ToolConfig>,
    #[serde(default)]
    pub transitions: Vec<TransitionConfig>,
    #[serde(default)]
    pub on_enter: Option<OnEnterAction>,
    #[serde(default)]
    pub is_final: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionConfig {
    pub transition_trigger: TransitionTrigger,
    #[serde(default)]
    pub condition: Option<String>,
    pub target: TransitionTarget,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    OnUserTurn,
    OnToolResult,
    Always,
}

/// A transition target: a sibling state id, or one of the reserved
/// pseudo-states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransitionTarget {
    Pseudo(PseudoTarget),
    State(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PseudoTarget {
    Exit,
    Abandon,
    GoHome,
}

impl TransitionTarget {
    /// Custom deserialization would require distinguishing reserved words
    /// from arbitrary state ids; callers instead use `resolve` against a
    /// known state id set.
    pub fn resolve<'a>(&'a self, state_ids: &HashSet<String>) -> TransitionTargetKind<'a> {
        match self {
            TransitionTarget::Pseudo(p) => TransitionTargetKind::Pseudo(*p),
            TransitionTarget::State(s) => {
                if state_ids.contains(s) {
                    TransitionTargetKind::State(s)
                } else {
                    match s.as_str() {
                        "exit" => TransitionTargetKind::Pseudo(PseudoTarget::Exit),
                        "abandon" => TransitionTargetKind::Pseudo(PseudoTarget::Abandon),
                        "go_home" => TransitionTargetKind::Pseudo(PseudoTarget::GoHome),
                        _ => TransitionTargetKind::Unknown(s),
                    }
                }
            }
        }
    }
}

pub enum TransitionTargetKind<'a> {
    State(&'a str),
    Pseudo(PseudoTarget),
    Unknown(&'a str),
}

/// Action block run when a state is entered.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OnEnterAction {
    #[serde(default)]
    pub send_message: Option<String>,
    #[serde(default)]
    pub call_tool: Option<OnEnterCallTool>,
    #[serde(default)]
    pub fetch_context: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnEnterCallTool {
    pub tool_name: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Key under which the result is stored in `state_data`. Defaults to
    /// `tool_name` when absent (§4.J layer 2).
    #[serde(default)]
    pub store_as: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_ids(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_sibling_state() {
        let target = TransitionTarget::State("confirm_send".into());
        let ids = state_ids(&["confirm_send", "success"]);
        match target.resolve(&ids) {
            TransitionTargetKind::State(s) => assert_eq!(s, "confirm_send"),
            _ => panic!("expected State"),
        }
    }

    #[test]
    fn resolve_reserved_word_not_a_state() {
        let target = TransitionTarget::State("go_home".into());
        let ids = state_ids(&["confirm_send"]);
        assert!(matches!(
            target.resolve(&ids),
            TransitionTargetKind::Pseudo(PseudoTarget::GoHome)
        ));
    }

    #[test]
    fn resolve_unknown_state_is_reported() {
        let target = TransitionTarget::State("nonexistent".into());
        let ids = state_ids(&["confirm_send"]);
        assert!(matches!(
            target.resolve(&ids),
            TransitionTargetKind::Unknown("nonexistent")
        ));
    }
}
