use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Downstream service gateway (§4.H, §6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Static map from a `service`-routed tool name to the downstream HTTP
/// call the tool executor issues on its behalf. The base URL is shared;
/// each entry only contributes a method and a path template with
/// `{param}` placeholders filled from the tool call's arguments.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceGatewayConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub endpoints: HashMap<String, ServiceEndpoint>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    #[serde(default)]
    pub method: HttpMethod,
    /// e.g. `/v1/transfers/{recipient_id}`.
    pub path_template: String,
    /// Overrides `timeouts.service_gateway_ms` for this endpoint only.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
    Patch,
}

impl ServiceGatewayConfig {
    pub fn endpoint_for(&self, tool_name: &str) -> Option<&ServiceEndpoint> {
        self.endpoints.get(tool_name)
    }
}

impl ServiceEndpoint {
    /// Substitutes `{param}` placeholders in the path template from the
    /// tool call's arguments. Returns `None` if a placeholder has no
    /// matching argument.
    pub fn render_path(&self, arguments: &serde_json::Value) -> Option<String> {
        let mut path = self.path_template.clone();
        let mut cursor = 0;
        loop {
            let Some(open) = path[cursor..].find('{') else {
                break;
            };
            let open = cursor + open;
            let Some(close) = path[open..].find('}') else {
                break;
            };
            let close = open + close;
            let key = &path[open + 1..close];
            let value = arguments.get(key)?;
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            path.replace_range(open..=close, &rendered);
            cursor = open + rendered.len();
        }
        Some(path)
    }
}

fn d_base_url() -> String {
    "http://localhost:8090".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_single_placeholder() {
        let ep = ServiceEndpoint {
            method: HttpMethod::Post,
            path_template: "/v1/transfers/{recipient_id}".into(),
            timeout_ms: None,
        };
        let args = serde_json::json!({"recipient_id": "r-42"});
        assert_eq!(ep.render_path(&args).unwrap(), "/v1/transfers/r-42");
    }

    #[test]
    fn missing_argument_yields_none() {
        let ep = ServiceEndpoint {
            method: HttpMethod::Get,
            path_template: "/v1/rates/{pair}".into(),
            timeout_ms: None,
        };
        assert!(ep.render_path(&serde_json::json!({})).is_none());
    }

    #[test]
    fn endpoint_lookup_by_tool_name() {
        let mut endpoints = HashMap::new();
        endpoints.insert(
            "create_transfer".to_string(),
            ServiceEndpoint {
                method: HttpMethod::Post,
                path_template: "/v1/transfers".into(),
                timeout_ms: None,
            },
        );
        let cfg = ServiceGatewayConfig {
            base_url: d_base_url(),
            endpoints,
        };
        assert!(cfg.endpoint_for("create_transfer").is_some());
        assert!(cfg.endpoint_for("unknown_tool").is_none());
    }
}
