mod agents;
mod context;
mod enrichment;
mod flows;
mod llm;
mod server;
mod service_gateway;
mod sessions;
mod templates;
mod tools;

pub use agents::*;
pub use context::*;
pub use enrichment::*;
pub use flows::*;
pub use llm::*;
pub use server::*;
pub use service_gateway::*;
pub use sessions::*;
pub use templates::*;
pub use tools::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub service_gateway: ServiceGatewayConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    /// Agent definitions, keyed by `config_id` (§4.A, §4.B).
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Environment variable holding the admin bearer token.
    /// If the env var is unset, admin endpoints are **disabled** (403).
    #[serde(default = "d_admin_token_env")]
    pub token_env: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            token_env: d_admin_token_env(),
        }
    }
}

fn d_admin_token_env() -> String {
    "SA_ADMIN_TOKEN".into()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and the agent tree and return a list of
    /// issues (§4.B "Startup validation"). Returns an empty vec when
    /// everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.server.port == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.server.host.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.service_gateway.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "service_gateway.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        } else if !self.service_gateway.base_url.starts_with("http://")
            && !self.service_gateway.base_url.starts_with("https://")
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "service_gateway.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.service_gateway.base_url
                ),
            });
        }

        if self.llm.provider.base_url.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.provider.base_url".into(),
                message: "base_url must not be empty".into(),
            });
        }

        if self.server.cors.allowed_origins.len() == 1 && self.server.cors.allowed_origins[0] == "*"
        {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "server.cors.allowed_origins".into(),
                message: "wildcard \"*\" allows all origins (not recommended for production)"
                    .into(),
            });
        }

        if self.agents.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agents".into(),
                message: "no agents configured — at least one root agent is required".into(),
            });
        }

        // Every parent_agent_id must resolve to a known agent; exactly one
        // root (parent_agent_id == None) must exist (§4.B).
        let mut roots = 0usize;
        for (id, agent) in &self.agents {
            match &agent.parent_agent_id {
                None => roots += 1,
                Some(parent) if !self.agents.contains_key(parent) => {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("agents.{id}.parent_agent_id"),
                        message: format!("parent agent \"{parent}\" does not exist"),
                    });
                }
                Some(_) => {}
            }
            if agent.config_id != *id {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("agents.{id}.config_id"),
                    message: format!(
                        "config_id \"{}\" does not match map key \"{id}\"",
                        agent.config_id
                    ),
                });
            }
        }
        if roots == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agents".into(),
                message: "no root agent found (an agent with parent_agent_id = null)".into(),
            });
        } else if roots > 1 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "agents".into(),
                message: format!("expected exactly one root agent, found {roots}"),
            });
        }

        // Tool names must be globally unique across all agents (§3 ToolConfig).
        let mut seen_tools: HashMap<&str, &str> = HashMap::new();
        for (agent_id, agent) in &self.agents {
            for tool in &agent.tools {
                if let Some(owner) = seen_tools.insert(&tool.name, agent_id) {
                    errors.push(ConfigError {
                        severity: ConfigSeverity::Error,
                        field: format!("agents.{agent_id}.tools.{}", tool.name),
                        message: format!(
                            "tool name \"{}\" already declared by agent \"{owner}\"",
                            tool.name
                        ),
                    });
                }
            }
        }

        errors
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
