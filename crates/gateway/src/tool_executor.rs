//! The tool executor (§4.H): confirmation gate, parameter validation and
//! coercion, sanitisation, dispatch to the downstream service gateway,
//! response interpretation and canonical-field normalisation.

use std::time::Duration;

use serde_json::{Map, Value};

use sa_domain::config::{HttpMethod, ServiceEndpoint, ServiceGatewayConfig, ToolConfig};
use sa_registry::path;

/// One turn's worth of arguments to a tool call, plus the confirmation
/// and flow-state context the executor needs.
#[derive(Debug, Clone)]
pub struct ToolCallParams {
    pub params: Map<String, Value>,
    /// `true` when a pending confirmation for this exact tool was just
    /// affirmed — the executor skips `requires_confirmation` and dispatches.
    pub skip_confirmation: bool,
    pub flow_state_data: Map<String, Value>,
}

/// The outcome of one tool call, never a panic or an unhandled `Err` —
/// every failure mode the tool executor can hit becomes a field here.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub success: bool,
    pub requires_confirmation: bool,
    pub confirmation_message: Option<String>,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub error_code: Option<String>,
}

impl ToolResult {
    fn failure(error_code: &str, error: impl Into<String>) -> Self {
        Self {
            success: false,
            requires_confirmation: false,
            confirmation_message: None,
            data: None,
            error: Some(error.into()),
            error_code: Some(error_code.to_owned()),
        }
    }

    fn needs_confirmation(message: String) -> Self {
        Self {
            success: false,
            requires_confirmation: true,
            confirmation_message: Some(message),
            data: None,
            error: None,
            error_code: None,
        }
    }

    fn success(data: Value) -> Self {
        Self {
            success: true,
            requires_confirmation: false,
            confirmation_message: None,
            data: Some(data),
            error: None,
            error_code: None,
        }
    }
}

pub struct ToolExecutor {
    gateway: ServiceGatewayConfig,
    http: reqwest::Client,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(gateway: ServiceGatewayConfig, timeout_ms: u64) -> Self {
        Self {
            gateway,
            http: reqwest::Client::new(),
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    /// Runs the full six-step pipeline: confirmation gate, validation +
    /// coercion, sanitisation, dispatch, interpretation, normalisation.
    pub async fn execute(
        &self,
        tool: &ToolConfig,
        call: ToolCallParams,
        user_id: &str,
        language: &str,
    ) -> ToolResult {
        if tool.requires_confirmation && !call.skip_confirmation {
            let mut context = call.flow_state_data.clone();
            for (k, v) in &call.params {
                context.insert(k.clone(), v.clone());
            }
            let template = tool
                .confirmation_template
                .as_deref()
                .unwrap_or("Are you sure you want to proceed?");
            let message = sa_registry::template::render(template, &Value::Object(context));
            return ToolResult::needs_confirmation(message);
        }

        let mut params = match Self::validate_and_coerce(tool, &call.params) {
            Ok(p) => p,
            Err(result) => return result,
        };
        Self::sanitize(&mut params);

        let Some(endpoint) = self.gateway.endpoint_for(&tool.name) else {
            return ToolResult::failure(
                "INVALID_PARAMETERS",
                format!("no service gateway endpoint configured for tool \"{}\"", tool.name),
            );
        };

        self.dispatch(endpoint, &params, user_id, language).await
    }

    /// Type-checks and coerces every declared parameter, ported from the
    /// original `_coerce_type` rules (§3 supplemental field).
    pub fn validate_and_coerce(
        tool: &ToolConfig,
        params: &Map<String, Value>,
    ) -> Result<Map<String, Value>, ToolResult> {
        let mut out = Map::new();
        for spec in &tool.parameters {
            let Some(raw) = params.get(&spec.name).cloned() else {
                if spec.required {
                    return Err(ToolResult::failure(
                        "INVALID_PARAMETERS",
                        format!("missing required parameter \"{}\"", spec.name),
                    ));
                }
                continue;
            };
            let coerced = coerce_value(spec.param_type, &raw).ok_or_else(|| {
                ToolResult::failure(
                    "INVALID_PARAMETERS",
                    format!("parameter \"{}\" has the wrong type", spec.name),
                )
            })?;
            out.insert(spec.name.clone(), coerced);
        }
        // Parameters the tool doesn't declare still ride along (flow-level
        // data, e.g. a recipient id picked up earlier in a sub-flow).
        for (k, v) in params {
            if !out.contains_key(k) {
                out.insert(k.clone(), v.clone());
            }
        }
        Ok(out)
    }

    /// Strips NUL bytes and non-printable characters (other than `\n`/`\t`)
    /// from every string value, trims, and truncates to 10 000 characters.
    /// Recurses into nested objects/arrays. Never fails.
    pub fn sanitize(params: &mut Map<String, Value>) {
        for value in params.values_mut() {
            sanitize_value(value);
        }
    }

    async fn dispatch(
        &self,
        endpoint: &ServiceEndpoint,
        params: &Map<String, Value>,
        user_id: &str,
        language: &str,
    ) -> ToolResult {
        let args = Value::Object(params.clone());
        let Some(rendered_path) = endpoint.render_path(&args) else {
            return ToolResult::failure(
                "INVALID_PARAMETERS",
                "one or more path placeholders did not resolve from the call's parameters",
            );
        };
        let consumed = path_placeholder_keys(&endpoint.path_template);
        let remaining: Map<String, Value> = params
            .iter()
            .filter(|(k, _)| !consumed.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let url = format!("{}{}", self.gateway.base_url.trim_end_matches('/'), rendered_path);
        let timeout = endpoint
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.timeout);

        let method = match endpoint.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut request = self
            .http
            .request(method, &url)
            .timeout(timeout)
            .header("X-User-Id", user_id)
            .header("Accept-Language", language);

        request = match endpoint.method {
            HttpMethod::Get | HttpMethod::Delete => {
                if remaining.is_empty() {
                    request
                } else {
                    request.query(&remaining)
                }
            }
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch => {
                request.header("Content-Type", "application/json").json(&remaining)
            }
        };

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                return if e.is_timeout() {
                    ToolResult::failure("TIMEOUT", e.to_string())
                } else {
                    ToolResult::failure("CONNECTION_ERROR", e.to_string())
                };
            }
        };

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(_) => Value::Null,
        };

        if status.as_u16() >= 400 {
            return interpret_error_body(&body);
        }

        let mut result = interpret_success_body(body);
        if let Some(data) = result.data.as_mut() {
            normalize_canonical_fields(data);
        }
        result
    }
}

fn coerce_value(param_type: sa_domain::config::ParameterType, raw: &Value) -> Option<Value> {
    use sa_domain::config::ParameterType;
    match param_type {
        ParameterType::String => match raw {
            Value::String(s) => Some(Value::String(s.clone())),
            Value::Number(n) => Some(Value::String(n.to_string())),
            Value::Bool(b) => Some(Value::String(b.to_string())),
            _ => None,
        },
        ParameterType::Number => match raw {
            Value::Number(n) => n.as_f64().map(|f| serde_json::json!(f)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| serde_json::json!(f)),
            _ => None,
        },
        ParameterType::Integer => match raw {
            Value::Bool(_) => None,
            Value::Number(n) => n.as_i64().map(|i| serde_json::json!(i)).or_else(|| {
                n.as_f64().map(|f| serde_json::json!(f.trunc() as i64))
            }),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| serde_json::json!(f.trunc() as i64)),
            _ => None,
        },
        ParameterType::Boolean => match raw {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::String(s) => match s.to_lowercase().as_str() {
                "true" | "1" | "yes" | "y" => Some(Value::Bool(true)),
                "false" | "0" | "no" | "n" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        ParameterType::Object => match raw {
            Value::Object(_) => Some(raw.clone()),
            _ => None,
        },
        ParameterType::Array => match raw {
            Value::Array(_) => Some(raw.clone()),
            _ => None,
        },
    }
}

fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| *c != '\0' && (!c.is_control() || *c == '\n' || *c == '\t'))
                .collect();
            let mut cleaned = cleaned.trim().to_owned();
            if cleaned.chars().count() > 10_000 {
                tracing::warn!("tool parameter string truncated to 10000 characters");
                cleaned = cleaned.chars().take(10_000).collect();
            }
            *s = cleaned;
        }
        Value::Array(items) => {
            for item in items {
                sanitize_value(item);
            }
        }
        Value::Object(map) => {
            for v in map.values_mut() {
                sanitize_value(v);
            }
        }
        _ => {}
    }
}

/// Extracts the `{key}` placeholder names from a path template, used to
/// split consumed arguments from the ones that become the query string
/// or JSON body.
fn path_placeholder_keys(template: &str) -> std::collections::HashSet<&str> {
    let mut out = std::collections::HashSet::new();
    let mut cursor = 0;
    while let Some(open) = template[cursor..].find('{') {
        let open = cursor + open;
        let Some(close) = template[open..].find('}') else {
            break;
        };
        let close = open + close;
        out.insert(&template[open + 1..close]);
        cursor = close + 1;
    }
    out
}

fn interpret_error_body(body: &Value) -> ToolResult {
    if let Some(detail) = body.get("detail") {
        let error = detail
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("upstream error")
            .to_owned();
        let error_code = detail
            .get("error_code")
            .and_then(Value::as_str)
            .unwrap_or("UPSTREAM_ERROR")
            .to_owned();
        return ToolResult::failure(&error_code, error);
    }
    let raw = body.to_string();
    let truncated: String = raw.chars().take(500).collect();
    ToolResult::failure("UPSTREAM_ERROR", truncated)
}

fn interpret_success_body(body: Value) -> ToolResult {
    match body.get("success") {
        Some(Value::Bool(false)) => {
            let error = body
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_owned();
            let error_code = body
                .get("error_code")
                .and_then(Value::as_str)
                .unwrap_or("UPSTREAM_ERROR")
                .to_owned();
            ToolResult::failure(&error_code, error)
        }
        Some(Value::Bool(true)) => {
            let data = body.get("data").cloned().unwrap_or(Value::Null);
            ToolResult::success(data)
        }
        _ => ToolResult::success(body),
    }
}

/// Copies the canonical result fields onto stable top-level keys using
/// the same snake/camel path-resolution fallback the condition evaluator
/// uses, so a gateway emitting `transactionId` still satisfies a template
/// expecting `transaction_id`.
fn normalize_canonical_fields(data: &mut Value) {
    const CANONICAL: &[&str] = &["transaction_id", "reference", "amount", "currency", "timestamp", "status"];
    let Value::Object(map) = data else {
        return;
    };
    let mut additions = Vec::new();
    for field in CANONICAL {
        if map.contains_key(*field) {
            continue;
        }
        if let Some(key) = path::resolve_key(map, field) {
            additions.push((field.to_string(), map.get(key).cloned().unwrap()));
        }
    }
    for (k, v) in additions {
        map.insert(k, v);
    }
}

/// Classifies a user's free-text reply to a pending confirmation as
/// affirmative, negative, or unclear (`None`), ported from the closed
/// bilingual vocabulary `_classify_confirmation` used.
pub fn classify_user_confirmation(text: &str) -> Option<bool> {
    const AFFIRMATIVE: &[&str] = &[
        "sí", "si", "yes", "yeah", "yep", "confirmo", "confirmar", "dale", "ok", "okay", "hazlo",
        "adelante", "procede", "claro", "por supuesto", "está bien", "esta bien",
    ];
    const NEGATIVE: &[&str] = &[
        "no", "nop", "nope", "cancela", "cancelar", "cancel", "no quiero", "mejor no", "dejalo",
        "déjalo", "olvidalo", "olvídalo",
    ];
    let normalized = text.trim().to_lowercase();
    if AFFIRMATIVE.contains(&normalized.as_str()) {
        Some(true)
    } else if NEGATIVE.contains(&normalized.as_str()) {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::config::{ParameterSpec, ParameterType};

    fn param(name: &str, param_type: ParameterType, required: bool) -> ParameterSpec {
        ParameterSpec {
            name: name.into(),
            param_type,
            required,
            description: None,
            enum_values: None,
        }
    }

    fn tool_with_params(params: Vec<ParameterSpec>) -> ToolConfig {
        ToolConfig {
            name: "create_transfer".into(),
            description: String::new(),
            parameters: params,
            requires_confirmation: false,
            confirmation_template: None,
            side_effects: Default::default(),
            flow_transition: None,
            routing: None,
        }
    }

    #[test]
    fn coerces_numeric_string_to_integer() {
        let tool = tool_with_params(vec![param("amount", ParameterType::Integer, true)]);
        let mut params = Map::new();
        params.insert("amount".into(), Value::String("200".into()));
        let coerced = ToolExecutor::validate_and_coerce(&tool, &params).unwrap();
        assert_eq!(coerced["amount"], serde_json::json!(200));
    }

    #[test]
    fn integer_rejects_boolean() {
        let tool = tool_with_params(vec![param("amount", ParameterType::Integer, true)]);
        let mut params = Map::new();
        params.insert("amount".into(), Value::Bool(true));
        let err = ToolExecutor::validate_and_coerce(&tool, &params).unwrap_err();
        assert_eq!(err.error_code.as_deref(), Some("INVALID_PARAMETERS"));
    }

    #[test]
    fn missing_required_parameter_fails() {
        let tool = tool_with_params(vec![param("recipient_id", ParameterType::String, true)]);
        let err = ToolExecutor::validate_and_coerce(&tool, &Map::new()).unwrap_err();
        assert_eq!(err.error_code.as_deref(), Some("INVALID_PARAMETERS"));
    }

    #[test]
    fn boolean_string_variants_coerce() {
        let tool = tool_with_params(vec![param("confirmed", ParameterType::Boolean, true)]);
        let mut params = Map::new();
        params.insert("confirmed".into(), Value::String("yes".into()));
        let coerced = ToolExecutor::validate_and_coerce(&tool, &params).unwrap();
        assert_eq!(coerced["confirmed"], Value::Bool(true));
    }

    #[test]
    fn sanitize_strips_control_chars_and_trims() {
        let mut params = Map::new();
        params.insert("note".into(), Value::String("  hi\u{0}\x07 there \n".into()));
        ToolExecutor::sanitize(&mut params);
        assert_eq!(params["note"], Value::String("hi there".into()));
    }

    #[test]
    fn sanitize_truncates_long_strings() {
        let mut params = Map::new();
        params.insert("note".into(), Value::String("a".repeat(10_050)));
        ToolExecutor::sanitize(&mut params);
        assert_eq!(params["note"].as_str().unwrap().chars().count(), 10_000);
    }

    #[test]
    fn classify_confirmation_recognizes_bilingual_vocab() {
        assert_eq!(classify_user_confirmation("Yes"), Some(true));
        assert_eq!(classify_user_confirmation("sí"), Some(true));
        assert_eq!(classify_user_confirmation("cancelar"), Some(false));
        assert_eq!(classify_user_confirmation("maybe later"), None);
    }

    #[test]
    fn normalize_canonical_fields_fills_from_camel_case() {
        let mut data = serde_json::json!({"transactionId": "tx_1", "other": "x"});
        normalize_canonical_fields(&mut data);
        assert_eq!(data["transaction_id"], "tx_1");
    }

    #[test]
    fn path_placeholder_keys_extracts_names() {
        let keys = path_placeholder_keys("/v1/transfers/{recipient_id}/confirm/{txn_id}");
        assert!(keys.contains("recipient_id"));
        assert!(keys.contains("txn_id"));
    }
}
