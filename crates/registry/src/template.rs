//! `{{dotted.path}}` template rendering for confirmation prompts and
//! response templates (§4.D). Legacy `${...}` and `{...}` spellings are
//! accepted for backward compatibility with older agent configs.
//!
//! An unresolved placeholder is STRIPPED rather than left in place — a
//! customer-facing message must never leak raw `{{...}}` syntax.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::path;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z0-9_.]+)\s*\}\}|\$\{\s*([A-Za-z0-9_.]+)\s*\}|\{\s*([A-Za-z0-9_.]+)\s*\}")
            .expect("static template placeholder regex is valid")
    })
}

/// Render `template` against `context`, substituting every resolvable
/// dotted path and stripping any placeholder that does not resolve.
pub fn render(template: &str, context: &Value) -> String {
    placeholder_re()
        .replace_all(template, |caps: &regex::Captures| {
            let path = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match path::resolve_path(context, path) {
                Some(value) => format_value(value),
                None => {
                    tracing::debug!(placeholder = path, "unresolved template placeholder stripped");
                    String::new()
                }
            }
        })
        .into_owned()
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => format_list(items),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Joins a JSON array into a human-readable comma list with an "and"
/// before the final item, the way recipient/phone lists render in
/// confirmation messages (`a, b and c`).
pub fn format_list(items: &[Value]) -> String {
    let rendered: Vec<String> = items.iter().map(format_value).collect();
    match rendered.len() {
        0 => String::new(),
        1 => rendered[0].clone(),
        2 => format!("{} and {}", rendered[0], rendered[1]),
        _ => {
            let (last, head) = rendered.split_last().unwrap();
            format!("{} and {}", head.join(", "), last)
        }
    }
}

/// A response template matched against a trigger, with required-field
/// enforcement. `find_matching` picks the first template whose trigger
/// matches; `apply` renders it only if every `required_fields` entry
/// resolves in `context`, otherwise it logs a warning and returns `None`
/// so the caller can fall back to a generic message.
pub fn apply<'a>(
    template: &str,
    required_fields: &[String],
    context: &'a Value,
) -> Option<String> {
    let missing: Vec<&str> = required_fields
        .iter()
        .filter(|f| path::resolve_path(context, f).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        tracing::warn!(
            missing_fields = ?missing,
            "response template skipped: required fields unresolved"
        );
        return None;
    }
    Some(render(template, context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_simple_placeholder() {
        let ctx = json!({"amount": 200, "currency": "USD"});
        assert_eq!(
            render("Sending {{amount}} {{currency}}", &ctx),
            "Sending 200 USD"
        );
    }

    #[test]
    fn renders_dotted_path() {
        let ctx = json!({"recipient": {"name": "Ana"}});
        assert_eq!(render("Hello {{recipient.name}}", &ctx), "Hello Ana");
    }

    #[test]
    fn strips_unresolved_placeholder() {
        let ctx = json!({"amount": 200});
        assert_eq!(render("Total: {{amount}} ({{discount}})", &ctx), "Total: 200 ()");
    }

    #[test]
    fn legacy_dollar_brace_syntax_supported() {
        let ctx = json!({"amount": 50});
        assert_eq!(render("Pay ${amount}", &ctx), "Pay 50");
    }

    #[test]
    fn legacy_single_brace_syntax_supported() {
        let ctx = json!({"amount": 50});
        assert_eq!(render("Pay {amount}", &ctx), "Pay 50");
    }

    #[test]
    fn formats_list_with_and() {
        let items = vec![json!("Ana"), json!("Luis"), json!("Marta")];
        assert_eq!(format_list(&items), "Ana, Luis and Marta");
    }

    #[test]
    fn formats_two_item_list() {
        let items = vec![json!("Ana"), json!("Luis")];
        assert_eq!(format_list(&items), "Ana and Luis");
    }

    #[test]
    fn apply_requires_all_fields_present() {
        let ctx = json!({"transaction_id": "tx_1"});
        let required = vec!["transaction_id".to_string(), "amount".to_string()];
        assert!(apply("Sent {{transaction_id}}", &required, &ctx).is_none());
    }

    #[test]
    fn apply_renders_when_all_required_present() {
        let ctx = json!({"transaction_id": "tx_1", "amount": 200});
        let required = vec!["transaction_id".to_string(), "amount".to_string()];
        assert_eq!(
            apply("Sent {{transaction_id}} for {{amount}}", &required, &ctx).unwrap(),
            "Sent tx_1 for 200"
        );
    }
}
