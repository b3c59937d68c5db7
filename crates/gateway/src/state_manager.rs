//! The state manager (§4.G): the single writer to a [`Session`] during a
//! turn. Every mutation below runs under the per-session lock the
//! orchestrator holds for the turn's duration, so none of this module
//! does its own locking.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use sa_domain::session::{AgentFrame, CurrentFlow, PendingConfirmation, Session, SessionStatus};
use sa_domain::trace::{TraceEvent, TraceRecorder};
use sa_registry::registry::AgentRegistry;

/// Failures the state manager reports instead of panicking. All are
/// handled by the caller (routing handler or orchestrator) and logged —
/// never a reason to abort the turn outright.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StateError {
    #[error("unknown agent \"{0}\"")]
    UnknownAgent(String),
    #[error("agent \"{agent_id}\" has no subflow \"{subflow_id}\"")]
    UnknownSubflow { agent_id: String, subflow_id: String },
    #[error("flow \"{flow_id}\" on agent \"{agent_id}\" has no state \"{state_id}\"")]
    UnknownState {
        agent_id: String,
        flow_id: String,
        state_id: String,
    },
}

/// Pushes a new agent frame onto the stack. Unknown `agent_id` is a
/// routing-handler-level concern, never a panic.
pub fn push_agent(
    session: &mut Session,
    registry: &AgentRegistry,
    trace: &TraceRecorder,
    agent_id: &str,
    reason: &str,
) -> Result<(), StateError> {
    if registry.get_agent(agent_id).is_none() {
        return Err(StateError::UnknownAgent(agent_id.to_owned()));
    }
    session.agent_stack.push(AgentFrame {
        agent_config_id: agent_id.to_owned(),
        entered_at: Utc::now(),
        entry_reason: reason.to_owned(),
    });
    session.current_flow = None;
    session.pending_confirmation = None;
    trace.record(TraceEvent::AgentPushed {
        agent_config_id: agent_id.to_owned(),
        reason: reason.to_owned(),
    });
    Ok(())
}

/// Pops the active agent frame. No-op at stack depth 1. Returns whether a
/// frame was actually popped.
pub fn pop_agent(session: &mut Session, trace: &TraceRecorder) -> bool {
    if session.agent_stack.len() <= 1 {
        return false;
    }
    let popped = session.agent_stack.pop().expect("depth checked above");
    session.current_flow = None;
    session.pending_confirmation = None;
    trace.record(TraceEvent::AgentPopped {
        agent_config_id: popped.agent_config_id,
    });
    true
}

/// Truncates the agent stack to its first element. Still clears
/// flow/confirmation (P3) even when already at depth 1.
pub fn go_home(session: &mut Session, trace: &TraceRecorder) {
    session.agent_stack.truncate(1);
    session.current_flow = None;
    session.pending_confirmation = None;
    let agent_config_id = session.active_agent_id().to_owned();
    trace.record(TraceEvent::WentHome { agent_config_id });
}

/// Marks the session as escalated to a human agent.
pub fn escalate(session: &mut Session, trace: &TraceRecorder, reason: &str) {
    session.status = SessionStatus::Escalated;
    session.current_flow = None;
    session.pending_confirmation = None;
    trace.record(TraceEvent::Escalated {
        reason: reason.to_owned(),
    });
}

/// Enters a sub-flow, seeding `state_data` with the caller-computed
/// initial data (§4.I builds this; the state manager only stores it).
pub fn enter_subflow(
    session: &mut Session,
    trace: &TraceRecorder,
    flow_config_id: &str,
    initial_state: &str,
    initial_data: Map<String, Value>,
) {
    session.current_flow = Some(CurrentFlow {
        flow_config_id: flow_config_id.to_owned(),
        current_state_id: initial_state.to_owned(),
        state_data: initial_data.into_iter().collect(),
        entered_at: Utc::now(),
    });
    trace.record(TraceEvent::FlowEntered {
        flow_config_id: flow_config_id.to_owned(),
        state_id: initial_state.to_owned(),
    });
}

/// Moves the active flow to `target_state_id`. If the target is final,
/// the caller must have already rendered any `on_enter.send_message`
/// against the pre-clear `state_data` — this function clears the flow
/// immediately after recording the transition (§9 decision 1).
pub fn transition_state(
    session: &mut Session,
    trace: &TraceRecorder,
    target_state_id: &str,
    is_final: bool,
) {
    let Some(flow) = session.current_flow.as_mut() else {
        return;
    };
    let flow_config_id = flow.flow_config_id.clone();
    let from_state_id = flow.current_state_id.clone();
    flow.current_state_id = target_state_id.to_owned();
    trace.record(TraceEvent::FlowTransitioned {
        flow_config_id,
        from_state_id,
        to_state_id: target_state_id.to_owned(),
        is_final,
    });
    if is_final {
        session.current_flow = None;
    }
}

/// Shallow-merges `patch` into the active flow's `state_data`. No-op if
/// no flow is active.
pub fn update_flow_data(session: &mut Session, patch: &Map<String, Value>) {
    let Some(flow) = session.current_flow.as_mut() else {
        return;
    };
    for (k, v) in patch {
        flow.state_data.insert(k.clone(), v.clone());
    }
}

pub fn set_pending_confirmation(
    session: &mut Session,
    trace: &TraceRecorder,
    tool_name: &str,
    tool_params: Value,
    display_message: &str,
    expires_in: std::time::Duration,
) {
    session.pending_confirmation = Some(PendingConfirmation {
        tool_name: tool_name.to_owned(),
        tool_params,
        display_message: display_message.to_owned(),
        expires_at: Utc::now() + chrono::Duration::from_std(expires_in).unwrap_or_default(),
    });
    trace.record(TraceEvent::ConfirmationRequested {
        tool_name: tool_name.to_owned(),
    });
}

pub fn clear_pending_confirmation(session: &mut Session, trace: &TraceRecorder, affirmed: bool) {
    let tool_name = session
        .pending_confirmation
        .as_ref()
        .map(|pc| pc.tool_name.clone())
        .unwrap_or_default();
    session.pending_confirmation = None;
    trace.record(TraceEvent::ConfirmationResolved { tool_name, affirmed });
}

pub fn is_confirmation_expired(session: &Session, now: DateTime<Utc>) -> bool {
    session.is_confirmation_expired(now)
}
