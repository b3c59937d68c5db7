//! Context enrichment (§4.J): three independent, soft-failing layers that
//! populate flow `state_data` with information the LLM turn needs but the
//! user hasn't supplied this turn. None of these ever fail the turn — a
//! broken enrichment call is logged and otherwise invisible to the user.

use serde_json::{Map, Value};

use sa_domain::config::{Config, OnEnterAction};
use sa_domain::session::Session;

use crate::tool_executor::{ToolCallParams, ToolExecutor};

/// Layer 1: an agent's `context_requirements` (e.g. `["frequent_numbers"]`)
/// mapped through `EnrichmentConfig` to a read-only service-gateway tool,
/// fetched once per agent-entry and merged into the active flow's
/// `state_data` (a no-op if no flow is active — the data still reaches the
/// prompt via the context assembler's agent section once flows store it).
pub async fn enrich_from_agent_requirements(
    executor: &ToolExecutor,
    config: &Config,
    session: &mut Session,
    requirements: &[String],
    user_id: &str,
    language: &str,
) {
    for requirement in requirements {
        let Some(tool_name) = config.enrichment.tool_for(requirement) else {
            tracing::warn!(requirement, "no enrichment tool configured for requirement");
            continue;
        };
        let Some(route) = find_tool(config, tool_name) else {
            tracing::warn!(tool_name, "enrichment tool not found in any agent");
            continue;
        };
        let call = ToolCallParams {
            params: Map::new(),
            skip_confirmation: true,
            flow_state_data: flow_data(session),
        };
        let result = executor.execute(&route, call, user_id, language).await;
        if !result.success {
            tracing::warn!(tool_name, error = ?result.error, "agent-requirement enrichment failed");
            continue;
        }
        if let Some(data) = result.data {
            merge_into_flow(session, requirement, data);
        }
    }
}

/// Layer 2: a state's `on_enter.call_tool`, storing the tool's result
/// under `store_as` (defaulting to the tool name) in `state_data`.
pub async fn enrich_from_on_enter_call_tool(
    executor: &ToolExecutor,
    config: &Config,
    session: &mut Session,
    on_enter: &OnEnterAction,
    user_id: &str,
    language: &str,
) {
    let Some(call_tool) = &on_enter.call_tool else {
        return;
    };
    let Some(route) = find_tool(config, &call_tool.tool_name) else {
        tracing::warn!(tool_name = %call_tool.tool_name, "on_enter.call_tool target not found");
        return;
    };
    let params = match &call_tool.params {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            tracing::warn!(?other, "on_enter.call_tool params must be an object, skipping");
            return;
        }
    };
    let call = ToolCallParams {
        params,
        skip_confirmation: true,
        flow_state_data: flow_data(session),
    };
    let result = executor.execute(&route, call, user_id, language).await;
    if !result.success {
        tracing::warn!(tool_name = %call_tool.tool_name, error = ?result.error, "on_enter.call_tool failed");
        return;
    }
    let Some(data) = result.data else {
        return;
    };
    let store_as = call_tool.store_as.clone().unwrap_or_else(|| call_tool.tool_name.clone());
    merge_into_flow(session, &store_as, data);
}

/// Layer 3: a state's `on_enter.fetch_context` — a bare list of canonical
/// field names resolved via [`sa_registry::path::resolve_key`] against the
/// current flow's `state_data`, a cross-agent-owned fetch, or the user
/// context, whichever this process's enrichment config names a tool for.
pub async fn enrich_from_fetch_context(
    executor: &ToolExecutor,
    config: &Config,
    session: &mut Session,
    fields: &[String],
    user_id: &str,
    language: &str,
) {
    if fields.is_empty() {
        return;
    }
    enrich_from_agent_requirements(executor, config, session, fields, user_id, language).await;
}

fn flow_data(session: &Session) -> Map<String, Value> {
    session
        .current_flow
        .as_ref()
        .map(|f| f.state_data.clone().into_iter().collect())
        .unwrap_or_default()
}

fn merge_into_flow(session: &mut Session, key: &str, data: Value) {
    let Some(flow) = session.current_flow.as_mut() else {
        return;
    };
    flow.state_data.insert(key.to_owned(), data);
}

fn find_tool(config: &Config, tool_name: &str) -> Option<sa_domain::config::ToolConfig> {
    for agent in config.agents.values() {
        if let Some(tool) = agent.tools.iter().find(|t| t.name == tool_name) {
            return Some(tool.clone());
        }
        for subflow in &agent.subflows {
            for state in &subflow.states {
                if let Some(tool) = state.state_tools.iter().find(|t| t.name == tool_name) {
                    return Some(tool.clone());
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::EnrichmentConfig;

    #[test]
    fn flow_data_is_empty_without_active_flow() {
        let session = Session::new("s1".into(), "u1".into(), "root");
        assert!(flow_data(&session).is_empty());
    }

    #[test]
    fn merge_into_flow_is_noop_without_active_flow() {
        let mut session = Session::new("s1".into(), "u1".into(), "root");
        merge_into_flow(&mut session, "frequent_numbers", serde_json::json!([1, 2]));
        assert!(session.current_flow.is_none());
    }

    #[test]
    fn enrichment_config_resolves_known_requirement() {
        let config = EnrichmentConfig::default();
        assert_eq!(config.tool_for("balance"), Some("get_balance"));
        assert_eq!(config.tool_for("nonexistent_requirement"), None);
    }
}
