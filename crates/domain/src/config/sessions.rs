use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session & turn-executor policy (§4.F, §4.G, §4.K, §9)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Knobs that govern how the orchestrator manages per-session state across
/// turns — how much raw history rides along in the prompt, when it gets
/// compacted, how long a pending confirmation stays valid, and how deep the
/// agent stack is allowed to grow before a turn is refused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Number of most-recent messages kept verbatim in the prompt's
    /// `recent` section before compaction kicks in.
    #[serde(default = "d_recent_window")]
    pub recent_message_window: usize,
    /// Once the transcript exceeds this many messages, the oldest ones
    /// outside the recent window are folded into `CompactedHistory`.
    #[serde(default = "d_compaction_threshold")]
    pub compaction_threshold: usize,
    /// How long a pending confirmation remains valid before it is treated
    /// as expired on the next turn (§3 `PendingConfirmation`).
    #[serde(default = "d_confirmation_expiry_secs")]
    pub confirmation_expiry_secs: u64,
    /// Maximum agent-stack depth (`enter_agent` pushes); a turn that would
    /// exceed this is refused and traced as `RecursionLimitExceeded`.
    #[serde(default = "d_recursion_limit")]
    pub recursion_limit: u32,
    /// Minutes of inactivity after which a session is considered stale and
    /// eligible for eviction from the in-memory store.
    #[serde(default = "d_idle_eviction_minutes")]
    pub idle_eviction_minutes: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            recent_message_window: d_recent_window(),
            compaction_threshold: d_compaction_threshold(),
            confirmation_expiry_secs: d_confirmation_expiry_secs(),
            recursion_limit: d_recursion_limit(),
            idle_eviction_minutes: d_idle_eviction_minutes(),
        }
    }
}

fn d_recent_window() -> usize {
    20
}
fn d_compaction_threshold() -> usize {
    30
}
fn d_confirmation_expiry_secs() -> u64 {
    300
}
fn d_recursion_limit() -> u32 {
    4
}
fn d_idle_eviction_minutes() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = SessionsConfig::default();
        assert_eq!(c.recent_message_window, 20);
        assert_eq!(c.compaction_threshold, 30);
        assert_eq!(c.recursion_limit, 4);
    }
}
