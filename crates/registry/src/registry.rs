//! The agent registry (§4.B): an immutable, read-mostly snapshot of the
//! agent tree, swapped atomically on `reload()`. Every lookup a turn needs
//! — agent by id, subflow by id, state by id, routing for a tool name — is
//! served from this snapshot, never by re-walking the parsed config.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sa_domain::config::{
    AgentConfig, Config, ConfigError, ConfigSeverity, RoutingConfig, SubflowConfig,
    SubflowStateConfig, ToolConfig, TransitionTargetKind,
};

/// Resolved routing information for a tool name: the config that declared
/// it (inferred if the agent omitted an explicit `routing` block) plus the
/// id of the agent that owns it.
#[derive(Debug, Clone)]
pub struct ToolRoute {
    pub owner_agent_id: String,
    pub tool: ToolConfig,
    pub routing: RoutingConfig,
}

/// The full resolved tree, built once per `reload()` and shared via `Arc`
/// so concurrent turns read a consistent snapshot while a reload swaps in
/// a new one underneath them.
struct Snapshot {
    config: Config,
    agents: HashMap<String, AgentConfig>,
    root_agent_id: String,
    children: HashMap<String, Vec<String>>,
    tools_by_name: HashMap<String, ToolRoute>,
}

pub struct AgentRegistry {
    inner: RwLock<Arc<Snapshot>>,
}

impl AgentRegistry {
    /// Build a registry from a validated config. Callers should run
    /// `config.validate()` (plus [`AgentRegistry::lint`]) first and refuse
    /// to start on any `Error`-severity issue.
    pub fn new(config: Config) -> Self {
        Self {
            inner: RwLock::new(Arc::new(Self::build_snapshot(config))),
        }
    }

    /// Atomically replace the registry's contents with a freshly parsed
    /// config. In-flight turns keep using the `Arc` snapshot they already
    /// hold; new turns see the replacement immediately.
    pub fn reload(&self, config: Config) {
        let snapshot = Arc::new(Self::build_snapshot(config));
        *self.inner.write() = snapshot;
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.read().clone()
    }

    fn build_snapshot(config: Config) -> Snapshot {
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        let mut root_agent_id = String::new();
        for (id, agent) in &config.agents {
            match &agent.parent_agent_id {
                Some(parent) => children.entry(parent.clone()).or_default().push(id.clone()),
                None => root_agent_id = id.clone(),
            }
        }

        let mut tools_by_name = HashMap::new();
        for (agent_id, agent) in &config.agents {
            for tool in &agent.tools {
                let routing = tool.routing.clone().unwrap_or_else(|| RoutingConfig::infer(&tool.name));
                tools_by_name.insert(
                    tool.name.clone(),
                    ToolRoute {
                        owner_agent_id: agent_id.clone(),
                        tool: tool.clone(),
                        routing,
                    },
                );
            }
            for subflow in &agent.subflows {
                for state in &subflow.states {
                    for tool in &state.state_tools {
                        let routing =
                            tool.routing.clone().unwrap_or_else(|| RoutingConfig::infer(&tool.name));
                        tools_by_name.insert(
                            tool.name.clone(),
                            ToolRoute {
                                owner_agent_id: agent_id.clone(),
                                tool: tool.clone(),
                                routing,
                            },
                        );
                    }
                }
            }
        }

        Snapshot {
            agents: config.agents.clone(),
            config,
            root_agent_id,
            children,
            tools_by_name,
        }
    }

    pub fn config(&self) -> Config {
        self.snapshot().config.clone()
    }

    pub fn get_agent(&self, agent_id: &str) -> Option<AgentConfig> {
        self.snapshot().agents.get(agent_id).cloned()
    }

    pub fn get_root_agent(&self) -> Option<AgentConfig> {
        let snap = self.snapshot();
        snap.agents.get(&snap.root_agent_id).cloned()
    }

    pub fn root_agent_id(&self) -> String {
        self.snapshot().root_agent_id.clone()
    }

    pub fn get_children(&self, agent_id: &str) -> Vec<String> {
        self.snapshot()
            .children
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_subflow(&self, agent_id: &str, flow_id: &str) -> Option<SubflowConfig> {
        self.snapshot()
            .agents
            .get(agent_id)?
            .subflows
            .iter()
            .find(|f| f.config_id == flow_id)
            .cloned()
    }

    pub fn get_flow_state(
        &self,
        agent_id: &str,
        flow_id: &str,
        state_id: &str,
    ) -> Option<SubflowStateConfig> {
        self.get_subflow(agent_id, flow_id)?.state(state_id).cloned()
    }

    /// Resolve a tool name to its owning agent, config and routing. This is
    /// the single source of truth both the tool executor and the routing
    /// handler consult; a tool call the registry doesn't recognize is
    /// always a routing error, never a panic.
    pub fn get_tool_routing(&self, tool_name: &str) -> Option<ToolRoute> {
        self.snapshot().tools_by_name.get(tool_name).cloned()
    }

    /// Every ancestor of `agent_id`, nearest first, ending at the root.
    pub fn ancestors(&self, agent_id: &str) -> Vec<String> {
        let snap = self.snapshot();
        let mut out = Vec::new();
        let mut current = agent_id.to_string();
        while let Some(agent) = snap.agents.get(&current) {
            match &agent.parent_agent_id {
                Some(parent) => {
                    out.push(parent.clone());
                    current = parent.clone();
                }
                None => break,
            }
        }
        out
    }

    /// Structural lints beyond `Config::validate()`: transition targets
    /// that resolve to neither a sibling state nor a pseudo-target,
    /// `enter_agent`/`start_flow` tools whose target doesn't exist, and
    /// state tool names colliding with an agent-level tool name.
    pub fn lint(config: &Config) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        for (agent_id, agent) in &config.agents {
            let agent_tool_names: std::collections::HashSet<&str> =
                agent.tools.iter().map(|t| t.name.as_str()).collect();

            for subflow in &agent.subflows {
                let state_ids: std::collections::HashSet<String> =
                    subflow.states.iter().map(|s| s.state_id.clone()).collect();
                for state in &subflow.states {
                    for tool in &state.state_tools {
                        if agent_tool_names.contains(tool.name.as_str()) {
                            errors.push(ConfigError {
                                severity: ConfigSeverity::Error,
                                field: format!(
                                    "agents.{agent_id}.subflows.{}.states.{}.state_tools.{}",
                                    subflow.config_id, state.state_id, tool.name
                                ),
                                message: format!(
                                    "state tool \"{}\" collides with an agent-level tool of the same name",
                                    tool.name
                                ),
                            });
                        }
                    }
                    for transition in &state.transitions {
                        if let TransitionTargetKind::Unknown(target) =
                            transition.target.resolve(&state_ids)
                        {
                            errors.push(ConfigError {
                                severity: ConfigSeverity::Error,
                                field: format!(
                                    "agents.{agent_id}.subflows.{}.states.{}.transitions",
                                    subflow.config_id, state.state_id
                                ),
                                message: format!(
                                    "transition target \"{target}\" is neither a sibling state nor a pseudo-target"
                                ),
                            });
                        }
                    }
                }
            }

            for tool in &agent.tools {
                let routing = tool.routing.clone().unwrap_or_else(|| RoutingConfig::infer(&tool.name));
                match routing {
                    RoutingConfig::EnterAgent { target } => {
                        if !config.agents.contains_key(&target) {
                            errors.push(ConfigError {
                                severity: ConfigSeverity::Error,
                                field: format!("agents.{agent_id}.tools.{}", tool.name),
                                message: format!("enter_agent target \"{target}\" does not exist"),
                            });
                        }
                    }
                    RoutingConfig::StartFlow { target, cross_agent } => {
                        let owner = cross_agent.as_deref().unwrap_or(agent_id.as_str());
                        let owner_agent = config.agents.get(owner);
                        let has_flow = owner_agent
                            .map(|a| a.subflows.iter().any(|f| f.config_id == target))
                            .unwrap_or(false);
                        if !has_flow {
                            errors.push(ConfigError {
                                severity: ConfigSeverity::Error,
                                field: format!("agents.{agent_id}.tools.{}", tool.name),
                                message: format!(
                                    "start_flow target \"{target}\" is not a subflow of \"{owner}\""
                                ),
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{
        ModelConfig, NavigationFlags, PseudoTarget, SubflowStateConfig, TimeoutConfig,
        TransitionConfig, TransitionTarget, TransitionTrigger,
    };
    use std::collections::HashMap as Map;

    fn tool(name: &str) -> ToolConfig {
        ToolConfig {
            name: name.into(),
            description: String::new(),
            parameters: vec![],
            requires_confirmation: false,
            confirmation_template: None,
            side_effects: Default::default(),
            flow_transition: None,
            routing: None,
        }
    }

    fn base_agent(config_id: &str, parent: Option<&str>) -> AgentConfig {
        AgentConfig {
            config_id: config_id.into(),
            name: config_id.into(),
            description: String::new(),
            parent_agent_id: parent.map(String::from),
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

    fn config_with(agents: Vec<AgentConfig>) -> Config {
        let mut map = Map::new();
        for a in agents {
            map.insert(a.config_id.clone(), a);
        }
        Config {
            agents: map,
            ..Config::default()
        }
    }

    #[test]
    fn resolves_root_and_children() {
        let cfg = config_with(vec![
            base_agent("root", None),
            base_agent("remittances", Some("root")),
            base_agent("bill_pay", Some("root")),
        ]);
        let registry = AgentRegistry::new(cfg);
        assert_eq!(registry.root_agent_id(), "root");
        let mut children = registry.get_children("root");
        children.sort();
        assert_eq!(children, vec!["bill_pay".to_string(), "remittances".to_string()]);
    }

    #[test]
    fn tool_routing_is_inferred_from_prefix() {
        let mut root = base_agent("root", None);
        root.tools = vec![tool("enter_remittances")];
        let cfg = config_with(vec![root, base_agent("remittances", Some("root"))]);
        let registry = AgentRegistry::new(cfg);
        let route = registry.get_tool_routing("enter_remittances").unwrap();
        assert!(matches!(route.routing, RoutingConfig::EnterAgent { target } if target == "remittances"));
        assert_eq!(route.owner_agent_id, "root");
    }

    #[test]
    fn reload_swaps_snapshot_atomically() {
        let cfg1 = config_with(vec![base_agent("root", None)]);
        let registry = AgentRegistry::new(cfg1);
        assert!(registry.get_agent("remittances").is_none());

        let cfg2 = config_with(vec![base_agent("root", None), base_agent("remittances", Some("root"))]);
        registry.reload(cfg2);
        assert!(registry.get_agent("remittances").is_some());
    }

    #[test]
    fn ancestors_walks_to_root() {
        let cfg = config_with(vec![
            base_agent("root", None),
            base_agent("remittances", Some("root")),
            base_agent("send_money", Some("remittances")),
        ]);
        let registry = AgentRegistry::new(cfg);
        assert_eq!(registry.ancestors("send_money"), vec!["remittances", "root"]);
    }

    #[test]
    fn lint_flags_unresolved_transition_target() {
        let mut agent = base_agent("remittances", Some("root"));
        agent.subflows.push(SubflowConfig {
            config_id: "send".into(),
            initial_state: "collect".into(),
            data_schema: Default::default(),
            timeout_config: TimeoutConfig::default(),
            states: vec![SubflowStateConfig {
                state_id: "collect".into(),
                name: String::new(),
                agent_instructions: String::new(),
                state_tools: vec![],
                transitions: vec![TransitionConfig {
                    transition_trigger: TransitionTrigger::OnUserTurn,
                    condition: None,
                    target: TransitionTarget::State("nonexistent_state".into()),
                }],
                on_enter: None,
                is_final: false,
            }],
        });
        let cfg = config_with(vec![base_agent("root", None), agent]);
        let issues = AgentRegistry::lint(&cfg);
        assert!(issues.iter().any(|e| e.message.contains("neither a sibling state")));
    }

    #[test]
    fn lint_flags_missing_enter_agent_target() {
        let mut root = base_agent("root", None);
        root.tools = vec![tool("enter_nonexistent")];
        let cfg = config_with(vec![root]);
        let issues = AgentRegistry::lint(&cfg);
        assert!(issues.iter().any(|e| e.message.contains("enter_agent target")));
    }

    #[test]
    fn lint_accepts_cross_agent_start_flow() {
        let mut root = base_agent("root", None);
        root.tools = vec![ToolConfig {
            routing: Some(RoutingConfig::StartFlow {
                target: "send".into(),
                cross_agent: Some("remittances".into()),
            }),
            ..tool("start_flow_send_cross_agent")
        }];
        let mut remittances = base_agent("remittances", Some("root"));
        remittances.subflows.push(SubflowConfig {
            config_id: "send".into(),
            initial_state: "collect".into(),
            data_schema: Default::default(),
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
        let cfg = config_with(vec![root, remittances]);
        let issues = AgentRegistry::lint(&cfg);
        assert!(issues.is_empty(), "expected no lint issues, got: {issues:?}");
    }
}
