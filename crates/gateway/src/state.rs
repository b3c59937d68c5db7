use std::sync::Arc;

use sa_contextpack::ContextAssembler;
use sa_domain::config::Config;
use sa_providers::traits::LlmClient;
use sa_registry::registry::AgentRegistry;
use sa_sessions::SessionStore;

use crate::orchestrator::Engine;
use crate::runtime::SessionLockMap;
use crate::tool_executor::ToolExecutor;

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services** — config, agent registry, LLM client
/// - **Turn execution** — the orchestrator engine, per-session locks
/// - **Security** — the admin bearer token read once at startup
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub registry: Arc<AgentRegistry>,
    pub llm: Arc<dyn LlmClient>,

    // ── Turn execution ───────────────────────────────────────────────
    pub engine: Engine,
    pub session_locks: Arc<SessionLockMap>,

    // ── Security (startup-computed) ──────────────────────────────────
    /// SHA-256 digest of the admin bearer token, read once from
    /// `admin.token_env`. `None` disables every protected route (403),
    /// matching the "fail closed without a token" posture documented in §6.
    pub api_token_hash: Option<Vec<u8>>,
}

impl AppState {
    pub fn new(config: Config, registry: Arc<AgentRegistry>, sessions: Arc<SessionStore>, llm: Arc<dyn LlmClient>) -> Self {
        let config = Arc::new(config);
        let tool_executor = Arc::new(ToolExecutor::new(
            config.service_gateway.clone(),
            config.llm.timeouts.service_gateway_ms,
        ));
        let context_assembler = Arc::new(ContextAssembler::new(config.context.clone()));

        let engine = Engine {
            registry: registry.clone(),
            sessions,
            llm: llm.clone(),
            tool_executor,
            context_assembler,
            config: config.clone(),
        };

        let api_token_hash = match std::env::var(&config.admin.token_env) {
            Ok(token) if !token.is_empty() => {
                use sha2::{Digest, Sha256};
                tracing::info!(env_var = %config.admin.token_env, "API bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            _ => {
                tracing::warn!(
                    env_var = %config.admin.token_env,
                    "API bearer-token auth DISABLED — set it to enable"
                );
                None
            }
        };

        Self {
            config,
            registry,
            llm,
            engine,
            session_locks: Arc::new(SessionLockMap::new()),
            api_token_hash,
        }
    }
}
