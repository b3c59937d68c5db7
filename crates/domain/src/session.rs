//! The mutable session entity (§3) — central state every turn reads and,
//! through the state manager, writes exactly once per turn.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Session
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Completed,
    Escalated,
    Expired,
}

/// One frame of the agent stack. The top frame is the active agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentFrame {
    pub agent_config_id: String,
    pub entered_at: DateTime<Utc>,
    pub entry_reason: String,
}

/// The sub-flow currently in progress for this session, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentFlow {
    pub flow_config_id: String,
    pub current_state_id: String,
    #[serde(default)]
    pub state_data: HashMap<String, serde_json::Value>,
    pub entered_at: DateTime<Utc>,
}

/// A side-effecting tool call awaiting the user's next message to confirm
/// or cancel. Serialized on the session — never held as an in-memory
/// continuation between turns (see DESIGN.md on the confirmation dance).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub tool_name: String,
    pub tool_params: serde_json::Value,
    pub display_message: String,
    pub expires_at: DateTime<Utc>,
}

/// The central mutable entity of the orchestration kernel.
///
/// Invariants (enforced exclusively by the state manager, §4.G):
/// - (I1) `agent_stack` is non-empty while `status == Active`.
/// - (I2) entering a new agent or going home clears `current_flow` and
///   `pending_confirmation`.
/// - (I3) while `pending_confirmation` is set, no new tool call for a
///   different tool is dispatched without first resolving or expiring it.
/// - (I4) `current_flow.current_state_id` always names an existing state
///   in `current_flow.flow_config_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub status: SessionStatus,
    pub agent_stack: Vec<AgentFrame>,
    pub current_flow: Option<CurrentFlow>,
    pub pending_confirmation: Option<PendingConfirmation>,
    pub message_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    /// Preferred response language (BCP-47-ish tag, e.g. "en", "es").
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".into()
}

impl Session {
    /// A freshly created session: stack holds only the root agent.
    pub fn new(session_id: String, user_id: String, root_agent_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            user_id,
            status: SessionStatus::Active,
            agent_stack: vec![AgentFrame {
                agent_config_id: root_agent_id.to_owned(),
                entered_at: now,
                entry_reason: "session_start".into(),
            }],
            current_flow: None,
            pending_confirmation: None,
            message_count: 0,
            created_at: now,
            last_interaction_at: now,
            language: default_language(),
        }
    }

    /// The active agent — the top of the stack. Panics only if the
    /// invariant (I1) has already been violated elsewhere, which the
    /// state manager never permits.
    pub fn active_agent_id(&self) -> &str {
        &self
            .agent_stack
            .last()
            .expect("agent_stack must be non-empty while active")
            .agent_config_id
    }

    pub fn depth(&self) -> usize {
        self.agent_stack.len()
    }

    pub fn is_confirmation_expired(&self, now: DateTime<Utc>) -> bool {
        match &self.pending_confirmation {
            None => false,
            Some(pc) => now >= pc.expires_at,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Conversation messages
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    Tool,
}

/// Metadata attached to a persisted message for later transcript / event
/// browsing (§6 `GET /conversations/{id}`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MessageMetadata {
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub tools_called: Vec<String>,
    #[serde(default)]
    pub event_trace: Vec<crate::trace::TraceEntry>,
    #[serde(default)]
    pub flow_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub session_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub metadata: MessageMetadata,
    pub created_at: DateTime<Utc>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// User context (read-only to the core; seeded by an external collaborator)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub preferred_name: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub kyc_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserContext {
    pub user_id: String,
    #[serde(default)]
    pub profile: UserProfile,
    /// Per-product key/value blobs, e.g. `"remittances" -> {...}`.
    #[serde(default)]
    pub product_summaries: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub behavioral_summary: Option<String>,
}

/// A compacted history summary for a user, produced by the (external)
/// compaction collaborator and merely stored/fetched here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactedHistory {
    pub user_id: String,
    pub compacted_text: String,
    pub last_compacted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_single_frame_stack() {
        let s = Session::new("sess-1".into(), "user-1".into(), "root");
        assert_eq!(s.depth(), 1);
        assert_eq!(s.active_agent_id(), "root");
        assert_eq!(s.status, SessionStatus::Active);
        assert!(s.current_flow.is_none());
        assert!(s.pending_confirmation.is_none());
    }

    #[test]
    fn confirmation_expiry_at_exact_boundary_is_expired() {
        let mut s = Session::new("sess-1".into(), "user-1".into(), "root");
        let now = Utc::now();
        s.pending_confirmation = Some(PendingConfirmation {
            tool_name: "create_transfer".into(),
            tool_params: serde_json::json!({}),
            display_message: "Send $200?".into(),
            expires_at: now,
        });
        assert!(s.is_confirmation_expired(now));
    }

    #[test]
    fn no_pending_confirmation_is_never_expired() {
        let s = Session::new("sess-1".into(), "user-1".into(), "root");
        assert!(!s.is_confirmation_expired(Utc::now()));
    }
}
