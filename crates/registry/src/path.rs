//! Dotted-path resolution with snake_case / camelCase fallback, so a
//! condition or template written against `recipient_id` still resolves
//! against a context built with `recipientId`, and vice versa.

use serde_json::Value;

pub fn camel_to_snake(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    for (i, c) in value.chars().enumerate() {
        if c.is_uppercase() && i != 0 {
            out.push('_');
        }
        out.extend(c.to_lowercase());
    }
    out
}

pub fn snake_to_camel(value: &str) -> String {
    let mut parts = value.split('_');
    let Some(first) = parts.next() else {
        return value.to_string();
    };
    let mut out = first.to_string();
    for part in parts {
        let mut chars = part.chars();
        if let Some(c) = chars.next() {
            out.extend(c.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn normalized(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Resolves `key` against `map`'s keys, trying an exact match first, then
/// snake/camel conversions, then a fully-normalized (case + underscore
/// insensitive) scan.
pub fn resolve_key<'a>(
    map: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Option<&'a str> {
    if map.contains_key(key) {
        return map.keys().find(|k| k.as_str() == key).map(String::as_str);
    }
    for candidate in [camel_to_snake(key), snake_to_camel(key), key.to_lowercase()] {
        if let Some(k) = map.keys().find(|k| k.as_str() == candidate) {
            return Some(k.as_str());
        }
    }
    let target = normalized(key);
    map.keys()
        .find(|k| normalized(k) == target)
        .map(String::as_str)
}

pub fn contains_key(map: &serde_json::Map<String, Value>, key: &str) -> bool {
    resolve_key(map, key).is_some()
}

/// Resolves a dotted path against a JSON value, applying [`resolve_key`]
/// normalization at every object hop. Returns `None` when any segment is
/// absent.
pub fn resolve_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = data;
    for part in path.split('.') {
        let obj = current.as_object()?;
        let key = resolve_key(obj, part)?;
        current = obj.get(key)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_to_snake_splits_on_uppercase() {
        assert_eq!(camel_to_snake("recipientId"), "recipient_id");
        assert_eq!(camel_to_snake("phoneNumber"), "phone_number");
    }

    #[test]
    fn snake_to_camel_joins_words() {
        assert_eq!(snake_to_camel("recipient_id"), "recipientId");
    }

    #[test]
    fn resolve_path_falls_back_across_casing() {
        let data = serde_json::json!({"_tool_result": {"recipient_id": "rec_999"}});
        assert_eq!(
            resolve_path(&data, "_tool_result.recipientId").unwrap(),
            "rec_999"
        );
    }

    #[test]
    fn resolve_path_missing_segment_is_none() {
        let data = serde_json::json!({"application": {"approved": true}});
        assert!(resolve_path(&data, "application.status").is_none());
    }
}
