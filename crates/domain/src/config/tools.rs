use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A tool an agent may call. `name` is globally unique across all agents —
/// the registry's `tool_name → RoutingConfig` index relies on this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub requires_confirmation: bool,
    /// Template with `{{path}}` placeholders, rendered against
    /// `state_data ∪ params` when confirmation is required.
    #[serde(default)]
    pub confirmation_template: Option<String>,
    #[serde(default)]
    pub side_effects: SideEffect,
    #[serde(default)]
    pub flow_transition: Option<FlowTransitionConfig>,
    #[serde(default)]
    pub routing: Option<RoutingConfig>,
}

impl ToolConfig {
    /// Builds a JSON-schema `parameters` object for the LLM tool list
    /// (§4.E: "Every tool is emitted as `{name, description, parameters}`").
    pub fn json_schema(&self) -> serde_json::Value {
        let mut properties = serde_json::Map::new();
        let mut required = Vec::new();
        for p in &self.parameters {
            properties.insert(p.name.clone(), p.json_schema_type());
            if p.required {
                required.push(serde_json::Value::String(p.name.clone()));
            }
        }
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    #[cfg(test)]
    pub fn new_for_test(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            description: String::new(),
            parameters: vec![],
            requires_confirmation: false,
            confirmation_template: None,
            side_effects: SideEffect::Read,
            flow_transition: None,
            routing: None,
        }
    }
}

/// One declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterSpec {
    fn json_schema_type(&self) -> serde_json::Value {
        let base = match self.param_type {
            ParameterType::String => "string",
            ParameterType::Number => "number",
            ParameterType::Integer => "integer",
            ParameterType::Boolean => "boolean",
            ParameterType::Object => "object",
            ParameterType::Array => "array",
        };
        let mut obj = serde_json::Map::new();
        obj.insert("type".into(), serde_json::Value::String(base.into()));
        if let Some(desc) = &self.description {
            obj.insert("description".into(), serde_json::Value::String(desc.clone()));
        }
        if let Some(values) = &self.enum_values {
            obj.insert(
                "enum".into(),
                serde_json::Value::Array(
                    values.iter().cloned().map(serde_json::Value::String).collect(),
                ),
            );
        }
        serde_json::Value::Object(obj)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
}

/// Whether invoking the tool changes downstream state, used by audit
/// trails and as a hint for confirmation policy authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SideEffect {
    None,
    #[default]
    Read,
    Write,
    Financial,
}

/// What happens to the active sub-flow after the tool resolves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowTransitionConfig {
    #[serde(default)]
    pub on_success: Option<String>,
    #[serde(default)]
    pub on_error: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Routing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Tagged union describing how a tool call is routed. When a tool omits
/// this block, the registry infers it at load time from the tool's name
/// prefix (`enter_*` → `enter_agent`, `start_flow_*` → `start_flow`,
/// default → `service`; see `RoutingConfig::infer`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "routing_type", rename_all = "snake_case")]
pub enum RoutingConfig {
    EnterAgent { target: String },
    StartFlow {
        target: String,
        #[serde(default)]
        cross_agent: Option<String>,
    },
    Navigation { target: NavigationTarget },
    Service,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationTarget {
    UpOneLevel,
    GoHome,
    EscalateToHuman,
}

impl RoutingConfig {
    /// Infer a routing config from a tool's name when the config omits an
    /// explicit `routing` block (§3 RoutingConfig).
    pub fn infer(tool_name: &str) -> RoutingConfig {
        if let Some(target) = tool_name.strip_prefix("enter_") {
            return RoutingConfig::EnterAgent {
                target: target.to_owned(),
            };
        }
        if let Some(target) = tool_name.strip_prefix("start_flow_") {
            return RoutingConfig::StartFlow {
                target: target.to_owned(),
                cross_agent: None,
            };
        }
        RoutingConfig::Service
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infer_enter_agent_from_prefix() {
        let routing = RoutingConfig::infer("enter_remittances");
        assert!(matches!(
            routing,
            RoutingConfig::EnterAgent { target } if target == "remittances"
        ));
    }

    #[test]
    fn infer_start_flow_from_prefix() {
        let routing = RoutingConfig::infer("start_flow_recarga");
        match routing {
            RoutingConfig::StartFlow { target, cross_agent } => {
                assert_eq!(target, "recarga");
                assert!(cross_agent.is_none());
            }
            _ => panic!("expected StartFlow"),
        }
    }

    #[test]
    fn infer_defaults_to_service() {
        let routing = RoutingConfig::infer("get_exchange_rate");
        assert!(matches!(routing, RoutingConfig::Service));
    }

    #[test]
    fn json_schema_marks_required_fields() {
        let tool = ToolConfig {
            name: "create_transfer".into(),
            description: "Create a transfer".into(),
            parameters: vec![
                ParameterSpec {
                    name: "recipient_id".into(),
                    param_type: ParameterType::String,
                    required: true,
                    description: None,
                    enum_values: None,
                },
                ParameterSpec {
                    name: "amount_usd".into(),
                    param_type: ParameterType::Number,
                    required: true,
                    description: None,
                    enum_values: None,
                },
            ],
            requires_confirmation: true,
            confirmation_template: Some("Send ${{amount_usd}} to {{recipient_id}}?".into()),
            side_effects: SideEffect::Financial,
            flow_transition: None,
            routing: None,
        };
        let schema = tool.json_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
        assert_eq!(schema["properties"]["amount_usd"]["type"], "number");
    }
}
