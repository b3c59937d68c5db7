use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM client configuration (§4.L)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            timeouts: TimeoutsConfig::default(),
        }
    }
}

/// The single upstream chat-completions vendor this adapter speaks to.
/// The vendor SDK itself is an external collaborator (out of scope); this
/// config only carries what the thin adapter needs to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default = "d_default_model")]
    pub default_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            auth: AuthConfig::default(),
            default_model: d_default_model(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Env var holding the API key.
    #[serde(default = "d_auth_env")]
    pub env: String,
    #[serde(default = "d_auth_header")]
    pub header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            env: d_auth_env(),
            header: d_auth_header(),
        }
    }
}

/// Exponential backoff parameters for transient LLM failures
/// (rate-limit, connection errors, upstream 5xx). 4xx is never retried.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "d_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "d_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "d_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: d_max_attempts(),
            base_delay_ms: d_base_delay_ms(),
            backoff_factor: d_backoff_factor(),
        }
    }
}

impl RetryConfig {
    /// Delay before the given (1-indexed) retry attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let ms = self.base_delay_ms as f64 * self.backoff_factor.powi(attempt as i32 - 1);
        std::time::Duration::from_millis(ms.round() as u64)
    }
}

/// Bounded timeouts for every external call a turn may make (§5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "d_llm_timeout_ms")]
    pub llm_ms: u64,
    #[serde(default = "d_gateway_timeout_ms")]
    pub service_gateway_ms: u64,
    #[serde(default = "d_health_timeout_ms")]
    pub gateway_health_check_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            llm_ms: d_llm_timeout_ms(),
            service_gateway_ms: d_gateway_timeout_ms(),
            gateway_health_check_ms: d_health_timeout_ms(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.anthropic.com".into()
}
fn d_default_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}
fn d_auth_env() -> String {
    "ANTHROPIC_API_KEY".into()
}
fn d_auth_header() -> String {
    "x-api-key".into()
}
fn d_max_attempts() -> u32 {
    3
}
fn d_base_delay_ms() -> u64 {
    1000
}
fn d_backoff_factor() -> f64 {
    2.0
}
fn d_llm_timeout_ms() -> u64 {
    60_000
}
fn d_gateway_timeout_ms() -> u64 {
    30_000
}
fn d_health_timeout_ms() -> u64 {
    5_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_follows_exponential_backoff() {
        let r = RetryConfig::default();
        assert_eq!(r.delay_for_attempt(1).as_millis(), 1000);
        assert_eq!(r.delay_for_attempt(2).as_millis(), 2000);
        assert_eq!(r.delay_for_attempt(3).as_millis(), 4000);
    }

    #[test]
    fn timeouts_match_spec_defaults() {
        let t = TimeoutsConfig::default();
        assert_eq!(t.llm_ms, 60_000);
        assert_eq!(t.service_gateway_ms, 30_000);
        assert_eq!(t.gateway_health_check_ms, 5_000);
    }
}
