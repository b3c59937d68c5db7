use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context enrichment (§4.J layer 1)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Maps an agent's declared `context_requirements` entries to the tool
/// name that fetches them. Configuration, not a hardcoded Rust table, so
/// a deployment can add a new requirement/tool pairing without a rebuild.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "d_requirement_tools")]
    pub requirement_tools: HashMap<String, String>,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            requirement_tools: d_requirement_tools(),
        }
    }
}

impl EnrichmentConfig {
    pub fn tool_for(&self, requirement: &str) -> Option<&str> {
        self.requirement_tools.get(requirement).map(String::as_str)
    }
}

fn d_requirement_tools() -> HashMap<String, String> {
    [
        ("frequent_numbers", "get_frequent_numbers"),
        ("recipient_list", "list_recipients"),
        ("recent_transactions", "get_recent_transactions"),
        ("balance", "get_balance"),
        ("linked_cards", "list_linked_cards"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_map_covers_well_known_requirements() {
        let cfg = EnrichmentConfig::default();
        assert_eq!(cfg.tool_for("balance"), Some("get_balance"));
        assert_eq!(cfg.tool_for("recipient_list"), Some("list_recipients"));
        assert_eq!(cfg.tool_for("unknown_requirement"), None);
    }
}
