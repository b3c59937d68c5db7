use serde::{Deserialize, Serialize};

use super::flows::SubflowConfig;
use super::templates::ResponseTemplateConfig;
use super::tools::ToolConfig;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Agent definitions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A node in the agent tree. Parsed once at startup from a per-agent JSON
/// document and never mutated thereafter — the `raw` field retains the
/// original document for template localisation lookups the typed fields
/// don't cover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub config_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parent_agent_id: Option<String>,
    #[serde(default)]
    pub model_config: ModelConfig,
    #[serde(default)]
    pub navigation_flags: NavigationFlags,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub subflows: Vec<SubflowConfig>,
    #[serde(default)]
    pub response_templates: Vec<ResponseTemplateConfig>,
    /// Symbolic data keys this agent wants prefetched before the LLM call
    /// (§4.J layer 1), e.g. `"frequent_numbers"`, `"recipient_list"`.
    #[serde(default)]
    pub context_requirements: Vec<String>,
    /// Tool whitelist used outside any flow. `None` means "all of
    /// `tools`" — the common case.
    #[serde(default)]
    pub default_tools: Option<Vec<String>>,
    /// Free-text addition appended to the agent's system prompt section.
    #[serde(default)]
    pub system_prompt_addition: Option<String>,
    /// Original parsed document, retained verbatim for runtime
    /// localisation lookups the typed fields above don't cover.
    #[serde(default, skip_serializing)]
    pub raw: serde_json::Value,
}

/// Per-agent model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default = "d_temperature")]
    pub temperature: f64,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: d_model(),
            temperature: d_temperature(),
            max_tokens: d_max_tokens(),
        }
    }
}

/// Controls which synthetic navigation tools the context assembler
/// advertises for this agent (§4.E tool list).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NavigationFlags {
    #[serde(default = "d_true")]
    pub can_go_up: bool,
    #[serde(default = "d_true")]
    pub can_go_home: bool,
    #[serde(default = "d_true")]
    pub can_escalate: bool,
}

impl Default for NavigationFlags {
    fn default() -> Self {
        Self {
            can_go_up: true,
            can_go_home: true,
            can_escalate: true,
        }
    }
}

impl AgentConfig {
    /// The effective tool whitelist for use outside any sub-flow:
    /// `default_tools` intersected with `tools` if set, else all of `tools`.
    pub fn default_tool_names(&self) -> Vec<&str> {
        match &self.default_tools {
            Some(names) => names.iter().map(String::as_str).collect(),
            None => self.tools.iter().map(|t| t.name.as_str()).collect(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}
fn d_temperature() -> f64 {
    0.3
}
fn d_max_tokens() -> u32 {
    1024
}
fn d_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tool_names_falls_back_to_full_tool_list() {
        let agent = AgentConfig {
            config_id: "remittances".into(),
            name: "Remittances".into(),
            description: String::new(),
            parent_agent_id: Some("root".into()),
            model_config: ModelConfig::default(),
            navigation_flags: NavigationFlags::default(),
            tools: vec![
                ToolConfig::new_for_test("get_exchange_rate"),
                ToolConfig::new_for_test("create_transfer"),
            ],
            subflows: vec![],
            response_templates: vec![],
            context_requirements: vec![],
            default_tools: None,
            system_prompt_addition: None,
            raw: serde_json::json!({}),
        };
        assert_eq!(
            agent.default_tool_names(),
            vec!["get_exchange_rate", "create_transfer"]
        );
    }

    #[test]
    fn default_tool_names_honours_explicit_whitelist() {
        let agent_json = serde_json::json!({
            "config_id": "root",
            "name": "Root",
        });
        let mut agent: AgentConfig = serde_json::from_value(agent_json).unwrap();
        agent.tools = vec![
            ToolConfig::new_for_test("get_exchange_rate"),
            ToolConfig::new_for_test("create_transfer"),
        ];
        agent.default_tools = Some(vec!["get_exchange_rate".into()]);
        assert_eq!(agent.default_tool_names(), vec!["get_exchange_rate"]);
    }

    #[test]
    fn model_config_defaults() {
        let mc = ModelConfig::default();
        assert_eq!(mc.model, "claude-sonnet-4-5-20250929");
        assert!((mc.temperature - 0.3).abs() < 1e-9);
        assert_eq!(mc.max_tokens, 1024);
    }
}
