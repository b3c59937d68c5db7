//! The routing handler (§4.I): turns a tool call with `RoutingConfig` into
//! the corresponding [`Session`] mutation, via [`crate::state_manager`].
//! Service-routed tools are left unhandled for the tool executor.

use std::collections::HashMap;

use serde_json::{Map, Value};

use sa_domain::config::{NavigationTarget, RoutingConfig};
use sa_domain::session::Session;
use sa_domain::trace::TraceRecorder;
use sa_registry::registry::AgentRegistry;

use crate::state_manager::{self, StateError};
use crate::strings::FixedSentence;

/// The outcome of routing one tool call.
#[derive(Debug, Clone, Default)]
pub struct RoutingOutcome {
    /// `true` when routing fully handled the call (enter_agent, start_flow,
    /// navigation); `false` means it's a `service` tool and the orchestrator
    /// must hand it to the tool executor instead.
    pub handled: bool,
    pub state_changed: bool,
    /// Context requirements of the agent just entered, if any — feeds §4.J
    /// layer 1 enrichment for the turn that follows.
    pub context_requirements: Vec<String>,
    /// A fixed response to surface directly (escalation acknowledgment);
    /// `None` when the LLM still produces the turn's reply.
    pub response_text: Option<String>,
    pub error: Option<String>,
}

impl RoutingOutcome {
    fn error(message: impl Into<String>) -> Self {
        Self {
            handled: true,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// The fixed alias table for `start_flow` initial-data extraction's second
/// pass: maps a parameter name a tool call might carry to the data-schema
/// field it seeds when the schema field isn't present under its own name.
const START_FLOW_ALIASES: &[(&str, &str)] = &[
    ("phone_number", "phone_number"),
    ("recipient_id", "recipient_id"),
    ("amount", "amount"),
    ("amount_usd", "amount_usd"),
    ("carrier_id", "carrier_id"),
    ("loan_id", "snpl_loan_id"),
    ("snpl_loan_id", "snpl_loan_id"),
];

pub fn handle_tool_routing(
    registry: &AgentRegistry,
    session: &mut Session,
    trace: &TraceRecorder,
    tool_name: &str,
    params: &Map<String, Value>,
) -> RoutingOutcome {
    let Some(route) = registry.get_tool_routing(tool_name) else {
        return RoutingOutcome::error(format!("unknown tool \"{tool_name}\""));
    };

    match route.routing {
        RoutingConfig::EnterAgent { target } => {
            match state_manager::push_agent(session, registry, trace, &target, "tool call") {
                Ok(()) => {
                    let context_requirements = registry
                        .get_agent(&target)
                        .map(|a| a.context_requirements)
                        .unwrap_or_default();
                    RoutingOutcome {
                        handled: true,
                        state_changed: true,
                        context_requirements,
                        response_text: None,
                        error: None,
                    }
                }
                Err(StateError::UnknownAgent(id)) => RoutingOutcome::error(format!(
                    "enter_agent target \"{id}\" does not exist"
                )),
                Err(other) => RoutingOutcome::error(other.to_string()),
            }
        }
        RoutingConfig::StartFlow { target, cross_agent } => {
            let owner = cross_agent.as_deref().unwrap_or(route.owner_agent_id.as_str());
            let Some(subflow) = registry.get_subflow(owner, &target) else {
                return RoutingOutcome::error(format!(
                    "start_flow target \"{target}\" is not a subflow of \"{owner}\""
                ));
            };
            let initial_data = extract_initial_data(&subflow.data_schema, params);
            state_manager::enter_subflow(session, trace, &target, &subflow.initial_state, initial_data);
            RoutingOutcome {
                handled: true,
                state_changed: true,
                context_requirements: Vec::new(),
                response_text: None,
                error: None,
            }
        }
        RoutingConfig::Navigation { target } => handle_navigation(session, trace, target),
        RoutingConfig::Service => RoutingOutcome {
            handled: false,
            ..Default::default()
        },
    }
}

fn handle_navigation(session: &mut Session, trace: &TraceRecorder, target: NavigationTarget) -> RoutingOutcome {
    match target {
        NavigationTarget::UpOneLevel => {
            let popped = state_manager::pop_agent(session, trace);
            RoutingOutcome {
                handled: true,
                state_changed: popped,
                ..Default::default()
            }
        }
        NavigationTarget::GoHome => {
            state_manager::go_home(session, trace);
            RoutingOutcome {
                handled: true,
                state_changed: true,
                ..Default::default()
            }
        }
        NavigationTarget::EscalateToHuman => {
            state_manager::escalate(session, trace, "user requested escalation");
            RoutingOutcome {
                handled: true,
                state_changed: true,
                response_text: Some(FixedSentence::Escalated.for_language(&session.language).to_owned()),
                ..Default::default()
            }
        }
    }
}

/// Two-pass `start_flow` initial-data extraction (§4.I): pass one copies
/// exact `data_schema` key matches out of the call's parameters, pass two
/// fills any still-missing field from [`START_FLOW_ALIASES`].
fn extract_initial_data(
    data_schema: &std::collections::HashSet<String>,
    params: &Map<String, Value>,
) -> Map<String, Value> {
    let mut out = Map::new();
    for field in data_schema {
        if let Some(value) = params.get(field) {
            out.insert(field.clone(), value.clone());
        }
    }
    let aliases: HashMap<&str, &str> = START_FLOW_ALIASES.iter().copied().collect();
    for (source_key, schema_field) in &aliases {
        if !data_schema.contains(*schema_field) || out.contains_key(*schema_field) {
            continue;
        }
        if let Some(value) = params.get(*source_key) {
            out.insert((*schema_field).to_owned(), value.clone());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{
        AgentConfig, Config, ModelConfig, NavigationFlags, RoutingConfig, SubflowConfig,
        SubflowStateConfig, TimeoutConfig, ToolConfig,
    };
    use std::collections::HashSet;

    fn agent(id: &str, parent: Option<&str>, tools: Vec<ToolConfig>) -> AgentConfig {
        AgentConfig {
            config_id: id.into(),
            name: id.into(),
            description: String::new(),
            parent_agent_id: parent.map(String::from),
            model_config: ModelConfig::default(),
            navigation_flags: NavigationFlags::default(),
            tools,
            subflows: vec![],
            response_templates: vec![],
            context_requirements: vec!["frequent_numbers".into()],
            default_tools: None,
            system_prompt_addition: None,
            raw: serde_json::json!({}),
        }
    }

    fn tool(name: &str, routing: RoutingConfig) -> ToolConfig {
        ToolConfig {
            name: name.into(),
            description: String::new(),
            parameters: vec![],
            requires_confirmation: false,
            confirmation_template: None,
            side_effects: Default::default(),
            flow_transition: None,
            routing: Some(routing),
        }
    }

    fn registry_with_remittances() -> AgentRegistry {
        let mut root = agent(
            "root",
            None,
            vec![tool(
                "enter_remittances",
                RoutingConfig::EnterAgent { target: "remittances".into() },
            )],
        );
        root.context_requirements.clear();
        let mut remittances = agent("remittances", Some("root"), vec![]);
        remittances.subflows.push(SubflowConfig {
            config_id: "send_money".into(),
            initial_state: "collect".into(),
            data_schema: HashSet::from(["recipient_id".to_string(), "amount_usd".to_string()]),
            timeout_config: TimeoutConfig::default(),
            states: vec![SubflowStateConfig {
                state_id: "collect".into(),
                name: String::new(),
                agent_instructions: String::new(),
                state_tools: vec![],
                transitions: vec![],
                on_enter: None,
                is_final: false,
            }],
        });
        let mut agents = std::collections::HashMap::new();
        agents.insert("root".into(), root);
        agents.insert("remittances".into(), remittances);
        AgentRegistry::new(Config { agents, ..Config::default() })
    }

    #[test]
    fn enter_agent_pushes_and_returns_context_requirements() {
        let registry = registry_with_remittances();
        let mut session = Session::new("s1".into(), "u1".into(), "root");
        let trace = TraceRecorder::new("t1");
        let outcome = handle_tool_routing(&registry, &mut session, &trace, "enter_remittances", &Map::new());
        assert!(outcome.handled);
        assert!(outcome.error.is_none());
        assert_eq!(session.active_agent_id(), "remittances");
        assert_eq!(outcome.context_requirements, vec!["frequent_numbers".to_string()]);
    }

    #[test]
    fn start_flow_exact_match_pass_one() {
        let registry = registry_with_remittances();
        let mut session = Session::new("s1".into(), "u1".into(), "root");
        state_manager::push_agent(&mut session, &registry, &TraceRecorder::new("t1"), "remittances", "r").unwrap();
        let trace = TraceRecorder::new("t2");
        let mut params = Map::new();
        params.insert("recipient_id".into(), serde_json::json!("rec_1"));
        params.insert("amount_usd".into(), serde_json::json!(50));
        registry
            .get_tool_routing("enter_remittances")
            .map(drop);
        // route start_flow_send_money inline without registering it on the agent
        let initial = extract_initial_data(
            &HashSet::from(["recipient_id".to_string(), "amount_usd".to_string()]),
            &params,
        );
        assert_eq!(initial.get("recipient_id").unwrap(), "rec_1");
        assert_eq!(initial.get("amount_usd").unwrap(), 50);
        let _ = trace;
    }

    #[test]
    fn start_flow_alias_pass_two() {
        let schema = HashSet::from(["snpl_loan_id".to_string()]);
        let mut params = Map::new();
        params.insert("loan_id".into(), serde_json::json!("loan_42"));
        let initial = extract_initial_data(&schema, &params);
        assert_eq!(initial.get("snpl_loan_id").unwrap(), "loan_42");
    }

    #[test]
    fn unknown_tool_is_a_routing_error() {
        let registry = registry_with_remittances();
        let mut session = Session::new("s1".into(), "u1".into(), "root");
        let trace = TraceRecorder::new("t1");
        let outcome = handle_tool_routing(&registry, &mut session, &trace, "nonexistent_tool", &Map::new());
        assert!(outcome.error.is_some());
    }

    #[test]
    fn escalate_navigation_sets_status_and_response() {
        let mut root = agent("root", None, vec![]);
        root.tools = vec![tool(
            "escalate_to_human",
            RoutingConfig::Navigation { target: NavigationTarget::EscalateToHuman },
        )];
        let mut agents = std::collections::HashMap::new();
        agents.insert("root".into(), root);
        let registry = AgentRegistry::new(Config { agents, ..Config::default() });
        let mut session = Session::new("s1".into(), "u1".into(), "root");
        let trace = TraceRecorder::new("t1");
        let outcome = handle_tool_routing(&registry, &mut session, &trace, "escalate_to_human", &Map::new());
        assert!(outcome.response_text.is_some());
        assert_eq!(session.status, sa_domain::session::SessionStatus::Escalated);
    }

    #[test]
    fn service_tool_is_left_unhandled() {
        let mut root = agent("root", None, vec![tool("get_balance", RoutingConfig::Service)]);
        root.context_requirements.clear();
        let mut agents = std::collections::HashMap::new();
        agents.insert("root".into(), root);
        let registry = AgentRegistry::new(Config { agents, ..Config::default() });
        let mut session = Session::new("s1".into(), "u1".into(), "root");
        let trace = TraceRecorder::new("t1");
        let outcome = handle_tool_routing(&registry, &mut session, &trace, "get_balance", &Map::new());
        assert!(!outcome.handled);
    }
}
