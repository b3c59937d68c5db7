use serde::Serialize;

/// A single structured event in a turn's causal trace. Every entry carries
/// the `turn_id` of the `handle_message` invocation that produced it, so a
/// transcript reader can reconstruct exactly what happened during one turn
/// without guessing at interleaving (§5 Ordering guarantees).
#[derive(Debug, Clone, Serialize)]
pub struct TraceEntry {
    pub turn_id: String,
    pub sequence: u32,
    #[serde(flatten)]
    pub event: TraceEvent,
}

/// Structured trace events emitted across a turn's lifecycle.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    SessionResolved {
        session_id: String,
        user_id: String,
        is_new: bool,
    },
    AgentPushed {
        agent_config_id: String,
        reason: String,
    },
    AgentPopped {
        agent_config_id: String,
    },
    WentHome {
        agent_config_id: String,
    },
    Escalated {
        reason: String,
    },
    FlowEntered {
        flow_config_id: String,
        state_id: String,
    },
    FlowTransitioned {
        flow_config_id: String,
        from_state_id: String,
        to_state_id: String,
        is_final: bool,
    },
    ConfirmationRequested {
        tool_name: String,
    },
    ConfirmationResolved {
        tool_name: String,
        affirmed: bool,
    },
    ConfirmationExpired {
        tool_name: String,
    },
    ToolInvoked {
        tool_name: String,
        side_effects: String,
    },
    ToolResult {
        tool_name: String,
        success: bool,
        error_code: Option<String>,
        duration_ms: u64,
    },
    RoutingError {
        tool_name: String,
        message: String,
    },
    RecursionLimitExceeded {
        depth: u32,
    },
    LlmRequest {
        model: String,
        duration_ms: u64,
        input_tokens: Option<u32>,
        output_tokens: Option<u32>,
        retries: u32,
    },
    LlmRetry {
        attempt: u32,
        reason: String,
    },
}

impl TraceEvent {
    /// Emit this event as a structured tracing log line (best-effort; a
    /// serialization failure is never fatal to the turn).
    pub fn emit(&self, turn_id: &str, sequence: u32) {
        let entry = TraceEntry {
            turn_id: turn_id.to_owned(),
            sequence,
            event: self.clone(),
        };
        let json = serde_json::to_string(&entry).unwrap_or_default();
        tracing::info!(trace_event = %json, "turn_event");
    }
}

/// Monotonic per-turn sequence counter, handed to each component so event
/// trace entries share one `turn_id` and come out in causal order.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    turn_id: String,
    next_sequence: std::cell::Cell<u32>,
    entries: std::cell::RefCell<Vec<TraceEntry>>,
}

impl TraceRecorder {
    pub fn new(turn_id: impl Into<String>) -> Self {
        Self {
            turn_id: turn_id.into(),
            next_sequence: std::cell::Cell::new(0),
            entries: std::cell::RefCell::new(Vec::new()),
        }
    }

    pub fn turn_id(&self) -> &str {
        &self.turn_id
    }

    pub fn record(&self, event: TraceEvent) {
        let sequence = self.next_sequence.get();
        self.next_sequence.set(sequence + 1);
        event.emit(&self.turn_id, sequence);
        self.entries.borrow_mut().push(TraceEntry {
            turn_id: self.turn_id.clone(),
            sequence,
            event,
        });
    }

    /// Snapshot of everything recorded so far, in causal order.
    pub fn entries(&self) -> Vec<TraceEntry> {
        self.entries.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_increments_per_record() {
        let recorder = TraceRecorder::new("turn-1");
        recorder.record(TraceEvent::Escalated {
            reason: "user request".into(),
        });
        recorder.record(TraceEvent::RecursionLimitExceeded { depth: 4 });
        let entries = recorder.entries();
        assert_eq!(entries[0].sequence, 0);
        assert_eq!(entries[1].sequence, 1);
        assert_eq!(entries[0].turn_id, "turn-1");
    }
}
