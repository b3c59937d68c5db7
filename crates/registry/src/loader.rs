//! Loads per-agent JSON documents from a directory into a [`Config`]'s
//! `agents` map (§4.A). Never fails the whole load on a single bad file —
//! an agent document that doesn't parse is skipped and logged, matching
//! the "startup validation never crashes the process" posture; the caller
//! still refuses to serve if `Config::validate()` reports an `Error`.

use std::collections::HashSet;
use std::path::Path;

use sa_domain::config::{AgentConfig, Config};
use sa_domain::{Error, Result};

/// Reads every `*.json` file directly under `agents_dir` as an
/// [`AgentConfig`], keyed by its file stem (which must match `config_id`
/// — `Config::validate` enforces the match, this loader does not).
pub fn load_agents(agents_dir: &Path) -> Result<std::collections::HashMap<String, AgentConfig>> {
    let mut agents = std::collections::HashMap::new();
    if !agents_dir.exists() {
        tracing::warn!(dir = %agents_dir.display(), "agents directory not found");
        return Ok(agents);
    }

    let entries = std::fs::read_dir(agents_dir).map_err(Error::Io)?;
    for entry in entries {
        let entry = entry.map_err(Error::Io)?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<AgentConfig>(&text) {
                Ok(agent) => {
                    warn_unknown_placeholders(stem, &agent);
                    agents.insert(stem.to_string(), agent);
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "invalid agent config JSON, skipping");
                }
            },
            Err(e) => {
                tracing::error!(file = %path.display(), error = %e, "failed to read agent config file, skipping");
            }
        }
    }
    Ok(agents)
}

/// Loads a full [`Config`] whose `agents` map comes from `agents_dir` and
/// whose other sections come from a single TOML document at `base_path`
/// (§4.A). If `base_path` does not exist, every section falls back to its
/// default.
pub fn load_config(base_path: &Path, agents_dir: &Path) -> Result<Config> {
    let mut config: Config = if base_path.exists() {
        let text = std::fs::read_to_string(base_path).map_err(Error::Io)?;
        toml::from_str(&text).map_err(|e| Error::Config(e.to_string()))?
    } else {
        tracing::warn!(file = %base_path.display(), "base config not found, using defaults");
        Config::default()
    };
    config.agents = load_agents(agents_dir)?;
    Ok(config)
}

/// Best-effort warning for confirmation-template and `on_enter` message
/// placeholders that will never resolve at runtime: not a declared tool
/// parameter, not a flow `data_schema` key, and not one of the well-known
/// runtime keys the tool executor always populates.
fn warn_unknown_placeholders(agent_id: &str, agent: &AgentConfig) {
    const RUNTIME_KEYS: &[&str] = &[
        "amount",
        "amount_usd",
        "recipient_name",
        "currency",
        "eta",
        "status",
        "reference",
        "transaction_id",
    ];

    let mut known_flow_keys: HashSet<&str> = HashSet::new();
    for subflow in &agent.subflows {
        known_flow_keys.extend(subflow.data_schema.iter().map(String::as_str));
    }

    for tool in &agent.tools {
        let Some(template) = &tool.confirmation_template else {
            continue;
        };
        let param_names: HashSet<&str> = tool.parameters.iter().map(|p| p.name.as_str()).collect();
        let unknown: Vec<String> = extract_placeholders(template)
            .into_iter()
            .filter(|p| {
                let root = p.split('.').next().unwrap_or(p.as_str());
                !param_names.contains(root)
                    && !known_flow_keys.contains(root)
                    && !RUNTIME_KEYS.contains(&root)
            })
            .collect();
        if !unknown.is_empty() {
            tracing::warn!(
                agent_id,
                tool = %tool.name,
                placeholders = ?unknown,
                "confirmation template has placeholders not in tool params"
            );
        }
    }

    for subflow in &agent.subflows {
        let schema_keys: HashSet<&str> = subflow.data_schema.iter().map(String::as_str).collect();
        for state in &subflow.states {
            let Some(on_enter) = &state.on_enter else {
                continue;
            };
            let Some(template) = &on_enter.send_message else {
                continue;
            };
            let unknown: Vec<String> = extract_placeholders(template)
                .into_iter()
                .filter(|p| {
                    let root = p.split('.').next().unwrap_or(p.as_str());
                    !schema_keys.contains(root) && !RUNTIME_KEYS.contains(&root)
                })
                .collect();
            if !unknown.is_empty() {
                tracing::warn!(
                    agent_id,
                    flow = %subflow.config_id,
                    state = %state.state_id,
                    placeholders = ?unknown,
                    "on_enter message has placeholders not in flow data_schema"
                );
            }
        }
    }
}

fn extract_placeholders(template: &str) -> HashSet<String> {
    let mut out = HashSet::new();
    let re = regex::Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}|\$\{\s*([A-Za-z0-9_.]+)\s*\}|\{\s*([A-Za-z0-9_.]+)\s*\}")
        .expect("static placeholder regex is valid");
    for caps in re.captures_iter(template) {
        if let Some(m) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) {
            out.insert(m.as_str().to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{ModelConfig, NavigationFlags, ParameterSpec, ParameterType, ToolConfig};
    use std::io::Write;

    fn sample_agent() -> AgentConfig {
        AgentConfig {
            config_id: "remittances".into(),
            name: "Remittances".into(),
            description: String::new(),
            parent_agent_id: Some("root".into()),
            model_config: ModelConfig::default(),
            navigation_flags: NavigationFlags::default(),
            tools: vec![ToolConfig {
                name: "create_transfer".into(),
                description: String::new(),
                parameters: vec![ParameterSpec {
                    name: "recipient_id".into(),
                    param_type: ParameterType::String,
                    required: true,
                    description: None,
                    enum_values: None,
                }],
                requires_confirmation: true,
                confirmation_template: Some("Send to {{recipient_id}}, fee {{unknown_fee}}?".into()),
                side_effects: Default::default(),
                flow_transition: None,
                routing: None,
            }],
            subflows: vec![],
            response_templates: vec![],
            context_requirements: vec![],
            default_tools: None,
            system_prompt_addition: None,
            raw: serde_json::json!({}),
        }
    }

    #[test]
    fn warn_unknown_placeholders_does_not_panic() {
        // Exercised purely for its tracing side effect; must not panic.
        warn_unknown_placeholders("remittances", &sample_agent());
    }

    #[test]
    fn loads_agents_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("root.json")).unwrap();
        writeln!(f, r#"{{"config_id": "root", "name": "Root"}}"#).unwrap();
        let agents = load_agents(dir.path()).unwrap();
        assert!(agents.contains_key("root"));
    }

    #[test]
    fn missing_agents_dir_yields_empty_map() {
        let agents = load_agents(Path::new("/nonexistent/path/xyz")).unwrap();
        assert!(agents.is_empty());
    }

    #[test]
    fn invalid_json_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("broken.json")).unwrap();
        writeln!(f, "{{not valid json").unwrap();
        let agents = load_agents(dir.path()).unwrap();
        assert!(agents.is_empty());
    }
}
