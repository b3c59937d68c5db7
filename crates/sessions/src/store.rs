//! The session store (§4.F): CRUD over sessions, their append-only message
//! history, per-user compacted history and product context. The store never
//! inspects conversational semantics — that is the state manager's job.
//!
//! Sessions are kept in memory and mirrored to `<state_dir>/sessions/` as
//! JSON; messages are appended to a per-session JSONL transcript so history
//! survives a restart without rewriting the whole file on every turn.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use sa_domain::error::{Error, Result};
use sa_domain::session::{CompactedHistory, ConversationMessage, Session, UserContext};

/// Gateway-owned store for session state, transcripts and per-user context.
pub struct SessionStore {
    base_dir: PathBuf,
    sessions: RwLock<HashMap<String, Session>>,
    compacted_history: RwLock<HashMap<String, CompactedHistory>>,
    user_context: RwLock<HashMap<String, UserContext>>,
}

impl SessionStore {
    /// Load (or initialise) the store rooted at `state_dir/sessions`.
    pub fn new(state_dir: &Path) -> Result<Self> {
        let base_dir = state_dir.join("sessions");
        std::fs::create_dir_all(&base_dir).map_err(Error::Io)?;

        let sessions = load_all(&base_dir.join("sessions.json")).unwrap_or_default();
        let compacted_history = load_all(&base_dir.join("compacted_history.json")).unwrap_or_default();
        let user_context = load_all(&base_dir.join("user_context.json")).unwrap_or_default();

        tracing::info!(
            sessions = sessions.len(),
            path = %base_dir.display(),
            "session store loaded"
        );

        Ok(Self {
            base_dir,
            sessions: RwLock::new(sessions),
            compacted_history: RwLock::new(compacted_history),
            user_context: RwLock::new(user_context),
        })
    }

    /// Resolve an existing session by id, or mint a new one rooted at
    /// `root_agent_id` when `session_id` is absent or unknown (§4.F).
    pub fn get_or_create_session(&self, session_id: Option<&str>, user_id: &str, root_agent_id: &str) -> Session {
        if let Some(id) = session_id {
            if let Some(session) = self.sessions.read().get(id) {
                return session.clone();
            }
        }

        let new_id = session_id.map(str::to_owned).unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = Session::new(new_id, user_id.to_owned(), root_agent_id);
        self.sessions.write().insert(session.session_id.clone(), session.clone());
        self.persist_sessions();
        session
    }

    pub fn get_session(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().get(session_id).cloned()
    }

    /// All sessions, optionally filtered to one user, newest-interaction-first.
    pub fn list_sessions(&self, user_id: Option<&str>) -> Vec<Session> {
        let mut sessions: Vec<Session> = self
            .sessions
            .read()
            .values()
            .filter(|s| user_id.map_or(true, |uid| s.user_id == uid))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.last_interaction_at.cmp(&a.last_interaction_at));
        sessions
    }

    /// Overwrite a session's stored state. The single writer is the state
    /// manager; the store itself performs no validation of the transition.
    pub fn save_session(&self, session: &Session) {
        self.sessions.write().insert(session.session_id.clone(), session.clone());
        self.persist_sessions();
    }

    /// Append one message to a session's transcript. Append-only: no method
    /// exists to edit or remove a previously stored message.
    pub fn append_message(&self, message: &ConversationMessage) -> Result<()> {
        let path = self.base_dir.join(format!("{}.jsonl", message.session_id));
        let json = serde_json::to_string(message).map_err(Error::Json)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::Io)?;
        writeln!(file, "{json}").map_err(Error::Io)?;
        Ok(())
    }

    /// Load the `limit` most recent messages for a session, oldest-first.
    pub fn recent_messages(&self, session_id: &str, limit: usize) -> Result<Vec<ConversationMessage>> {
        let path = self.base_dir.join(format!("{session_id}.jsonl"));
        if !path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&path).map_err(Error::Io)?;
        let mut messages = Vec::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ConversationMessage>(line) {
                Ok(m) => messages.push(m),
                Err(e) => {
                    tracing::warn!(session_id, error = %e, "skipping malformed transcript line");
                }
            }
        }
        if messages.len() > limit {
            let drop = messages.len() - limit;
            messages.drain(0..drop);
        }
        Ok(messages)
    }

    pub fn get_compacted_history(&self, user_id: &str) -> Option<CompactedHistory> {
        self.compacted_history.read().get(user_id).cloned()
    }

    pub fn save_compacted_history(&self, history: CompactedHistory) {
        self.compacted_history.write().insert(history.user_id.clone(), history);
        self.persist(&self.base_dir.join("compacted_history.json"), &self.compacted_history);
    }

    pub fn get_user_context(&self, user_id: &str) -> Option<UserContext> {
        self.user_context.read().get(user_id).cloned()
    }

    pub fn save_user_context(&self, context: UserContext) {
        self.user_context.write().insert(context.user_id.clone(), context);
        self.persist(&self.base_dir.join("user_context.json"), &self.user_context);
    }

    fn persist_sessions(&self) {
        self.persist(&self.base_dir.join("sessions.json"), &self.sessions);
    }

    fn persist<T: serde::Serialize>(&self, path: &Path, data: &RwLock<HashMap<String, T>>) {
        let guard = data.read();
        match serde_json::to_string_pretty(&*guard) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    tracing::error!(path = %path.display(), error = %e, "failed to persist session store");
                }
            }
            Err(e) => tracing::error!(error = %e, "failed to serialize session store"),
        }
    }
}

fn load_all<T: serde::de::DeserializeOwned>(path: &Path) -> Result<HashMap<String, T>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
    Ok(serde_json::from_str(&raw).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sa_domain::session::{MessageMetadata, MessageRole};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sa-sessions-test-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn get_or_create_session_mints_new_session_with_root_agent() {
        let store = SessionStore::new(&temp_dir()).unwrap();
        let session = store.get_or_create_session(None, "user-1", "root");
        assert_eq!(session.active_agent_id(), "root");
        assert_eq!(session.depth(), 1);
    }

    #[test]
    fn get_or_create_session_returns_existing_session_unchanged() {
        let store = SessionStore::new(&temp_dir()).unwrap();
        let first = store.get_or_create_session(None, "user-1", "root");
        let second = store.get_or_create_session(Some(&first.session_id), "user-1", "root");
        assert_eq!(first.session_id, second.session_id);
    }

    #[test]
    fn unknown_session_id_creates_a_fresh_session() {
        let store = SessionStore::new(&temp_dir()).unwrap();
        let session = store.get_or_create_session(Some("nonexistent"), "user-1", "root");
        assert_eq!(session.session_id, "nonexistent");
        assert_eq!(session.active_agent_id(), "root");
    }

    #[test]
    fn messages_append_and_load_in_order() {
        let store = SessionStore::new(&temp_dir()).unwrap();
        let session = store.get_or_create_session(None, "user-1", "root");
        for content in ["hello", "how can I help?", "send money"] {
            store
                .append_message(&ConversationMessage {
                    session_id: session.session_id.clone(),
                    user_id: "user-1".into(),
                    role: MessageRole::User,
                    content: content.into(),
                    metadata: MessageMetadata::default(),
                    created_at: chrono::Utc::now(),
                })
                .unwrap();
        }
        let loaded = store.recent_messages(&session.session_id, 10).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].content, "hello");
        assert_eq!(loaded[2].content, "send money");
    }

    #[test]
    fn recent_messages_respects_limit_keeping_most_recent() {
        let store = SessionStore::new(&temp_dir()).unwrap();
        let session = store.get_or_create_session(None, "user-1", "root");
        for i in 0..5 {
            store
                .append_message(&ConversationMessage {
                    session_id: session.session_id.clone(),
                    user_id: "user-1".into(),
                    role: MessageRole::User,
                    content: format!("message {i}"),
                    metadata: MessageMetadata::default(),
                    created_at: chrono::Utc::now(),
                })
                .unwrap();
        }
        let loaded = store.recent_messages(&session.session_id, 2).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].content, "message 3");
        assert_eq!(loaded[1].content, "message 4");
    }

    #[test]
    fn compacted_history_round_trips() {
        let store = SessionStore::new(&temp_dir()).unwrap();
        store.save_compacted_history(CompactedHistory {
            user_id: "user-1".into(),
            compacted_text: "user asked about transfers".into(),
            last_compacted_at: chrono::Utc::now(),
        });
        let loaded = store.get_compacted_history("user-1").unwrap();
        assert_eq!(loaded.compacted_text, "user asked about transfers");
    }
}
