use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response templates
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A canned response the orchestrator prefers over a freeform LLM
/// follow-up when a tool resolves, a state is entered, or a confirmation
/// is needed. See the template renderer (§4.D) for match semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseTemplateConfig {
    pub name: String,
    pub trigger_config: TriggerConfig,
    /// String with `{{dotted.path}}` / `${dotted.path}` / `{dotted.path}`
    /// placeholders.
    pub template: String,
    /// Dotted paths that must all resolve for this template to apply.
    #[serde(default)]
    pub required_fields: Vec<String>,
    #[serde(default)]
    pub enforcement: Enforcement,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub state_name: Option<String>,
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    ToolSuccess,
    ToolError,
    StateEntry,
    Confirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    #[default]
    Suggested,
    Mandatory,
}

/// The lookup key a caller matches templates against — one concrete
/// instance of a `(trigger_type, tool_name?, state_name?, error_code?)`
/// tuple produced during a turn.
#[derive(Debug, Clone)]
pub struct TriggerKey<'a> {
    pub trigger_type: TriggerType,
    pub tool_name: Option<&'a str>,
    pub state_name: Option<&'a str>,
    pub error_code: Option<&'a str>,
}

impl TriggerConfig {
    /// A trigger config matches a key when the types agree and every field
    /// the config constrains (tool_name/state_name/error_code) matches;
    /// fields the config leaves unset are wildcards.
    pub fn matches(&self, key: &TriggerKey) -> bool {
        if self.trigger_type != key.trigger_type {
            return false;
        }
        if let Some(tn) = &self.tool_name {
            if Some(tn.as_str()) != key.tool_name {
                return false;
            }
        }
        if let Some(sn) = &self.state_name {
            if Some(sn.as_str()) != key.state_name {
                return false;
            }
        }
        if let Some(ec) = &self.error_code {
            if Some(ec.as_str()) != key.error_code {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmpl(tool_name: Option<&str>) -> ResponseTemplateConfig {
        ResponseTemplateConfig {
            name: "transfer_success".into(),
            trigger_config: TriggerConfig {
                trigger_type: TriggerType::ToolSuccess,
                tool_name: tool_name.map(String::from),
                state_name: None,
                error_code: None,
            },
            template: "Sent {{amount}} {{currency}} to {{recipient}}.".into(),
            required_fields: vec!["amount".into(), "currency".into(), "recipient".into()],
            enforcement: Enforcement::Mandatory,
        }
    }

    #[test]
    fn matches_exact_tool_name() {
        let t = tmpl(Some("create_transfer"));
        let key = TriggerKey {
            trigger_type: TriggerType::ToolSuccess,
            tool_name: Some("create_transfer"),
            state_name: None,
            error_code: None,
        };
        assert!(t.trigger_config.matches(&key));
    }

    #[test]
    fn wildcard_tool_name_matches_anything() {
        let t = tmpl(None);
        let key = TriggerKey {
            trigger_type: TriggerType::ToolSuccess,
            tool_name: Some("get_exchange_rate"),
            state_name: None,
            error_code: None,
        };
        assert!(t.trigger_config.matches(&key));
    }

    #[test]
    fn mismatched_trigger_type_does_not_match() {
        let t = tmpl(Some("create_transfer"));
        let key = TriggerKey {
            trigger_type: TriggerType::ToolError,
            tool_name: Some("create_transfer"),
            state_name: None,
            error_code: None,
        };
        assert!(!t.trigger_config.matches(&key));
    }
}
