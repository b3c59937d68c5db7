use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context assembler token budgets (§4.E)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-section token budgets for the context assembler. Each section is
/// truncated from the end when it overflows its budget; the `buffer`
/// entry is reserved headroom, never allocated to a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    #[serde(default = "d_system")]
    pub system_tokens: usize,
    #[serde(default = "d_user")]
    pub user_tokens: usize,
    #[serde(default = "d_product")]
    pub product_tokens: usize,
    #[serde(default = "d_recent")]
    pub recent_messages_tokens: usize,
    #[serde(default = "d_compacted")]
    pub compacted_tokens: usize,
    #[serde(default = "d_state")]
    pub state_tokens: usize,
    #[serde(default = "d_tools")]
    pub tools_tokens: usize,
    #[serde(default = "d_buffer")]
    pub buffer_tokens: usize,
    /// Locale for the base system prompt and section templates.
    #[serde(default = "d_locale")]
    pub default_locale: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            system_tokens: d_system(),
            user_tokens: d_user(),
            product_tokens: d_product(),
            recent_messages_tokens: d_recent(),
            compacted_tokens: d_compacted(),
            state_tokens: d_state(),
            tools_tokens: d_tools(),
            buffer_tokens: d_buffer(),
            default_locale: d_locale(),
        }
    }
}

fn d_system() -> usize {
    1000
}
fn d_user() -> usize {
    500
}
fn d_product() -> usize {
    500
}
fn d_recent() -> usize {
    2000
}
fn d_compacted() -> usize {
    500
}
fn d_state() -> usize {
    300
}
fn d_tools() -> usize {
    1000
}
fn d_buffer() -> usize {
    200
}
fn d_locale() -> String {
    "en".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_order_of_magnitude() {
        let c = ContextConfig::default();
        assert_eq!(c.system_tokens, 1000);
        assert_eq!(c.recent_messages_tokens, 2000);
        assert_eq!(c.buffer_tokens, 200);
    }
}
