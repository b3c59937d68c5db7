//! The orchestrator (§4.K): the turn driver tying the registry, session
//! store, context assembler, LLM client and tool executor together into
//! one `handle_message` call.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use sa_contextpack::{AssembleInput, ContextAssembler};
use sa_domain::config::{Config, TriggerKey, TriggerType};
use sa_domain::session::{ConversationMessage, MessageMetadata, MessageRole, Session, UserContext};
use sa_domain::tool::{Message, ToolCall};
use sa_domain::trace::TraceRecorder;
use sa_providers::{ChatRequest, LlmClient};
use sa_registry::registry::AgentRegistry;
use sa_sessions::store::SessionStore;

use crate::enrichment;
use crate::routing::{self, RoutingOutcome};
use crate::state_manager;
use crate::strings::FixedSentence;
use crate::tool_executor::{classify_user_confirmation, ToolCallParams, ToolExecutor};

/// Every long-lived collaborator one running turn needs. Cheap to clone —
/// every field is already behind an `Arc`.
#[derive(Clone)]
pub struct Engine {
    pub registry: Arc<AgentRegistry>,
    pub sessions: Arc<SessionStore>,
    pub llm: Arc<dyn LlmClient>,
    pub tool_executor: Arc<ToolExecutor>,
    pub context_assembler: Arc<ContextAssembler>,
    pub config: Arc<Config>,
}

/// What one `handle_message` call hands back to the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct TurnResponse {
    pub session_id: String,
    pub assistant_message: String,
    pub agent_id: String,
    pub agent_name: String,
    pub tool_calls: Vec<String>,
    pub pending_confirmation: bool,
    pub flow_state: Option<String>,
    pub escalated: bool,
    pub debug_info: Option<Value>,
}

/// Accumulates facts across one or more recursive inner calls so the
/// top-level caller can build one [`TurnResponse`].
struct TurnAccumulator {
    tool_calls: Vec<String>,
    trace: TraceRecorder,
}

pub async fn handle_message(
    engine: &Engine,
    user_id: &str,
    session_id: Option<&str>,
    message: &str,
) -> TurnResponse {
    let root_agent_id = engine.registry.root_agent_id();
    let mut session = engine.sessions.get_or_create_session(session_id, user_id, &root_agent_id);

    engine
        .sessions
        .append_message(&ConversationMessage {
            session_id: session.session_id.clone(),
            user_id: user_id.to_owned(),
            role: MessageRole::User,
            content: message.to_owned(),
            metadata: MessageMetadata::default(),
            created_at: chrono::Utc::now(),
        })
        .ok();

    let turn_id = uuid::Uuid::new_v4().to_string();
    let mut acc = TurnAccumulator {
        tool_calls: Vec::new(),
        trace: TraceRecorder::new(turn_id.as_str()),
    };

    let text = handle_message_inner(engine, &mut session, &mut acc, user_id, message, 0).await;

    session.message_count += 1;
    session.last_interaction_at = chrono::Utc::now();
    engine.sessions.save_session(&session);

    let flow_state = session.current_flow.as_ref().map(|f| f.current_state_id.clone());
    let agent = engine.registry.get_agent(session.active_agent_id());

    engine
        .sessions
        .append_message(&ConversationMessage {
            session_id: session.session_id.clone(),
            user_id: user_id.to_owned(),
            role: MessageRole::Assistant,
            content: text.clone(),
            metadata: MessageMetadata {
                agent_id: Some(session.active_agent_id().to_owned()),
                tools_called: acc.tool_calls.clone(),
                event_trace: acc.trace.entries(),
                flow_state: flow_state.clone(),
            },
            created_at: chrono::Utc::now(),
        })
        .ok();

    TurnResponse {
        session_id: session.session_id.clone(),
        assistant_message: text,
        agent_id: session.active_agent_id().to_owned(),
        agent_name: agent.map(|a| a.name).unwrap_or_default(),
        tool_calls: acc.tool_calls,
        pending_confirmation: session.pending_confirmation.is_some(),
        flow_state,
        escalated: matches!(session.status, sa_domain::session::SessionStatus::Escalated),
        debug_info: None,
    }
}

/// The recursive turn body. `depth` counts re-entries caused by a tool call
/// changing the active agent or flow within the same user turn — bounded by
/// `sessions.recursion_limit` (§9 decision 2), never unbounded language
/// recursion.
async fn handle_message_inner(
    engine: &Engine,
    session: &mut Session,
    acc: &mut TurnAccumulator,
    user_id: &str,
    message: &str,
    depth: u8,
) -> String {
    if depth as u32 >= engine.config.sessions.recursion_limit {
        acc.trace
            .record(sa_domain::trace::TraceEvent::RecursionLimitExceeded { depth: depth as u32 });
        return FixedSentence::RecursionLimitExceeded.for_language(&session.language).to_owned();
    }

    if let Some(confirmation_reply) = handle_pending_confirmation(engine, session, acc, user_id, message).await {
        return confirmation_reply;
    }

    let Some(agent) = engine.registry.get_agent(session.active_agent_id()) else {
        tracing::error!(agent_id = %session.active_agent_id(), "active agent missing from registry snapshot");
        return FixedSentence::TransientFailure.for_language(&session.language).to_owned();
    };
    let has_parent = agent.parent_agent_id.is_some();

    let current_state = session.current_flow.as_ref().and_then(|flow| {
        engine.registry.get_flow_state(session.active_agent_id(), &flow.flow_config_id, &flow.current_state_id)
    });

    if let Some(state) = &current_state {
        if let Some(on_enter) = &state.on_enter {
            enrichment::enrich_from_on_enter_call_tool(
                &engine.tool_executor,
                &engine.config,
                session,
                on_enter,
                user_id,
                &session.language.clone(),
            )
            .await;
            enrichment::enrich_from_fetch_context(
                &engine.tool_executor,
                &engine.config,
                session,
                &on_enter.fetch_context,
                user_id,
                &session.language.clone(),
            )
            .await;
        }
    }
    if !agent.context_requirements.is_empty() {
        enrichment::enrich_from_agent_requirements(
            &engine.tool_executor,
            &engine.config,
            session,
            &agent.context_requirements,
            user_id,
            &session.language.clone(),
        )
        .await;
    }

    let user_context = engine.sessions.get_user_context(user_id);
    let compacted_history = engine.sessions.get_compacted_history(user_id);
    let recent_messages = engine
        .sessions
        .recent_messages(&session.session_id, engine.config.sessions.recent_message_window)
        .unwrap_or_default();
    if recent_messages.len() >= engine.config.sessions.compaction_threshold {
        tracing::debug!(
            session_id = %session.session_id,
            count = recent_messages.len(),
            "recent message count has crossed the compaction threshold"
        );
    }

    let pending_confirmation = session.pending_confirmation.clone();
    let current_flow = session.current_flow.clone();
    let context = engine.context_assembler.assemble(AssembleInput {
        base_system_prompt: "You are a helpful financial services assistant.",
        agent: &agent,
        has_parent,
        user_context: user_context.as_ref(),
        compacted_history: compacted_history.as_ref(),
        current_flow: current_flow.as_ref(),
        current_state: current_state.as_ref(),
        pending_confirmation: pending_confirmation.as_ref(),
        recent_messages: &recent_messages,
        language: &session.language,
    });

    let mut messages = context.messages;
    messages.push(Message::user(message));

    let request = ChatRequest {
        system: context.system_prompt,
        messages,
        tools: context.tools,
        temperature: context.temperature,
        max_tokens: context.max_tokens,
        model: context.model,
    };

    let response = match engine.llm.chat(request).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "llm call failed");
            return FixedSentence::TransientFailure.for_language(&session.language).to_owned();
        }
    };

    if response.tool_calls.is_empty() {
        return response.text;
    }

    let mut state_changed = false;
    let mut escalation_text: Option<String> = None;
    let mut last_tool_response: Option<String> = None;

    for call in &response.tool_calls {
        acc.tool_calls.push(call.tool_name.clone());
        let dispatch = dispatch_tool_call(engine, session, &acc.trace, call, user_id).await;
        match dispatch {
            DispatchOutcome::RequiresConfirmation => {
                // `set_pending_confirmation` already ran inside dispatch_tool_call.
                return session
                    .pending_confirmation
                    .as_ref()
                    .map(|pc| pc.display_message.clone())
                    .unwrap_or_default();
            }
            DispatchOutcome::RoutingError { tool_name, message } => {
                acc.trace.record(sa_domain::trace::TraceEvent::RoutingError { tool_name, message });
            }
            DispatchOutcome::StateChanged(outcome) => {
                state_changed = true;
                if let Some(text) = outcome.response_text {
                    escalation_text = Some(text);
                }
            }
            DispatchOutcome::ServiceResult(formatted) => {
                last_tool_response = Some(formatted);
            }
            DispatchOutcome::LanguageChanged(confirmation) => {
                // §4.K step 10.a: handled locally, breaks out of the tool-call loop.
                return confirmation;
            }
        }
    }

    if let Some(text) = escalation_text {
        return text;
    }

    if state_changed {
        return Box::pin(handle_message_inner(engine, session, acc, user_id, message, depth + 1)).await;
    }

    last_tool_response.unwrap_or(response.text)
}

enum DispatchOutcome {
    RequiresConfirmation,
    RoutingError { tool_name: String, message: String },
    StateChanged(RoutingOutcome),
    ServiceResult(String),
    LanguageChanged(String),
}

/// Languages this engine has localised sentences for. Anything else falls
/// back to Spanish, matching `original_source`'s
/// `orchestrator.py::_process_tool_call`'s `change_language` handling.
const SUPPORTED_LANGUAGES: [&str; 2] = ["en", "es"];

fn normalize_language(requested: &str) -> String {
    if SUPPORTED_LANGUAGES.contains(&requested) { requested.to_owned() } else { "es".to_owned() }
}

async fn dispatch_tool_call(
    engine: &Engine,
    session: &mut Session,
    trace: &TraceRecorder,
    call: &ToolCall,
    user_id: &str,
) -> DispatchOutcome {
    let params = match &call.arguments {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        _ => Map::new(),
    };

    if call.tool_name == "change_language" {
        let requested = params.get("language").and_then(Value::as_str).unwrap_or("es");
        let language = normalize_language(requested);

        session.language = language.clone();

        let mut user_context = engine
            .sessions
            .get_user_context(user_id)
            .unwrap_or_else(|| UserContext { user_id: user_id.to_owned(), ..Default::default() });
        user_context.profile.language = language.clone();
        engine.sessions.save_user_context(user_context);

        return DispatchOutcome::LanguageChanged(FixedSentence::LanguageChanged.for_language(&language).to_owned());
    }

    if matches!(call.tool_name.as_str(), "go_home" | "up_one_level" | "escalate_to_human") {
        let outcome = match call.tool_name.as_str() {
            "go_home" => {
                state_manager::go_home(session, trace);
                RoutingOutcome { handled: true, state_changed: true, ..Default::default() }
            }
            "up_one_level" => {
                let popped = state_manager::pop_agent(session, trace);
                RoutingOutcome { handled: true, state_changed: popped, ..Default::default() }
            }
            _ => {
                state_manager::escalate(session, trace, "user requested escalation");
                RoutingOutcome {
                    handled: true,
                    state_changed: true,
                    response_text: Some(FixedSentence::Escalated.for_language(&session.language).to_owned()),
                    ..Default::default()
                }
            }
        };
        return DispatchOutcome::StateChanged(outcome);
    }

    let Some(route) = engine.registry.get_tool_routing(&call.tool_name) else {
        return DispatchOutcome::RoutingError {
            tool_name: call.tool_name.clone(),
            message: format!("unknown tool \"{}\"", call.tool_name),
        };
    };

    let outcome = routing::handle_tool_routing(&engine.registry, session, trace, &call.tool_name, &params);
    if outcome.handled {
        if let Some(error) = outcome.error {
            return DispatchOutcome::RoutingError { tool_name: call.tool_name.clone(), message: error };
        }
        return DispatchOutcome::StateChanged(outcome);
    }

    // `Service` routing: dispatch through the tool executor.
    let flow_state_data = session
        .current_flow
        .as_ref()
        .map(|f| f.state_data.clone().into_iter().collect())
        .unwrap_or_default();
    let call_params = ToolCallParams {
        params,
        skip_confirmation: false,
        flow_state_data,
    };
    let result = engine
        .tool_executor
        .execute(&route.tool, call_params, user_id, &session.language)
        .await;

    if result.requires_confirmation {
        let message = result.confirmation_message.unwrap_or_default();
        state_manager::set_pending_confirmation(
            session,
            trace,
            &call.tool_name,
            call.arguments.clone(),
            &message,
            std::time::Duration::from_secs(engine.config.sessions.confirmation_expiry_secs),
        );
        return DispatchOutcome::RequiresConfirmation;
    }

    if !result.success {
        let message = format!(
            "I couldn't complete that: {}",
            result.error.clone().unwrap_or_else(|| "something went wrong.".into())
        );
        if let Some(flow_transition) = &route.tool.flow_transition {
            if let Some(target) = &flow_transition.on_error {
                if let Some(rendered) = apply_flow_transition(engine, session, trace, target) {
                    return DispatchOutcome::ServiceResult(rendered);
                }
            }
        }
        return DispatchOutcome::ServiceResult(message);
    }

    if let Some(flow_transition) = &route.tool.flow_transition {
        if let Some(target) = &flow_transition.on_success {
            if let Some(rendered) = apply_flow_transition(engine, session, trace, target) {
                return DispatchOutcome::ServiceResult(rendered);
            }
        }
    }

    let formatted = format_tool_success(engine, &call.tool_name, result.data.as_ref());
    DispatchOutcome::ServiceResult(formatted)
}

/// Moves the flow to `target_state_id` and, if the new state carries an
/// `on_enter.send_message`, renders it against the pre-clear `state_data`
/// (§9 decision 1: rendered before a final state clears the flow) and
/// returns it so the caller can use it as the assistant reply.
fn apply_flow_transition(
    engine: &Engine,
    session: &mut Session,
    trace: &TraceRecorder,
    target_state_id: &str,
) -> Option<String> {
    let flow = session.current_flow.clone()?;
    let state = engine.registry.get_flow_state(session.active_agent_id(), &flow.flow_config_id, target_state_id)?;
    let rendered = render_on_enter_message(state.on_enter.as_ref(), &flow.state_data);
    state_manager::transition_state(session, trace, target_state_id, state.is_final);
    rendered
}

/// Renders a state's `on_enter.send_message` (if any) against flow
/// `state_data`, pulled out of [`apply_flow_transition`] so it's testable
/// without standing up a full [`Engine`].
fn render_on_enter_message(
    on_enter: Option<&sa_domain::config::OnEnterAction>,
    state_data: &HashMap<String, Value>,
) -> Option<String> {
    let template = on_enter?.send_message.as_ref()?;
    let context: Value = state_data.clone().into_iter().collect::<Map<String, Value>>().into();
    Some(sa_registry::template::render(template, &context))
}

/// Picks a response-template match first, falling back to a per-tool-name
/// hardcoded sentence or a generic acknowledgement — unless the gateway's
/// own result carries a `_message` field, which always wins (§4.K step
/// 10.e: "if the tool result contains a `_message` field, prefer it").
fn format_tool_success(engine: &Engine, tool_name: &str, data: Option<&Value>) -> String {
    pick_success_message(&engine.config.agents, tool_name, data)
}

fn pick_success_message(
    agents: &HashMap<String, sa_domain::config::AgentConfig>,
    tool_name: &str,
    data: Option<&Value>,
) -> String {
    if let Some(message) = data.and_then(|d| d.get("_message")).and_then(Value::as_str) {
        return message.to_owned();
    }

    let context = data.cloned().unwrap_or(Value::Null);
    for agent in agents.values() {
        for template in &agent.response_templates {
            let key = TriggerKey {
                trigger_type: TriggerType::ToolSuccess,
                tool_name: Some(tool_name),
                state_name: None,
                error_code: None,
            };
            if template.trigger_config.matches(&key) {
                if let Some(rendered) =
                    sa_registry::template::apply(&template.template, &template.required_fields, &context)
                {
                    return rendered;
                }
            }
        }
    }

    fallback_sentence(tool_name, &context)
}

fn fallback_sentence(tool_name: &str, context: &Value) -> String {
    let table: HashMap<&str, &str> = [
        ("create_transfer", "Your transfer is on its way."),
        ("make_payment", "Your payment has been submitted."),
        ("send_topup", "Your top-up has been sent."),
        ("pay_bill", "Your bill payment has been submitted."),
    ]
    .into_iter()
    .collect();

    if let Some(sentence) = table.get(tool_name) {
        return sentence.to_string();
    }
    let _ = context;
    "Done.".to_owned()
}

/// Resolves the user's yes/no reply against a pending confirmation,
/// returning `Some(reply text)` when the turn ends here without reaching
/// the LLM, or `None` when there's nothing pending to resolve — either
/// because there never was a pending confirmation, or because there was
/// one but it had expired, in which case it's cleared here and the caller
/// falls through to handle `message` as an ordinary fresh turn (§4.K step
/// 2: "restart at step 1 with the same user message", mirrored from
/// `original_source/backend/app/core/orchestrator.py`'s
/// `return await self.handle_message(user_message, ...)`).
async fn handle_pending_confirmation(
    engine: &Engine,
    session: &mut Session,
    acc: &mut TurnAccumulator,
    user_id: &str,
    message: &str,
) -> Option<String> {
    let pending = session.pending_confirmation.clone()?;

    if state_manager::is_confirmation_expired(session, chrono::Utc::now()) {
        state_manager::clear_pending_confirmation(session, &acc.trace, false);
        acc.trace.record(sa_domain::trace::TraceEvent::ConfirmationExpired {
            tool_name: pending.tool_name.clone(),
        });
        return None;
    }

    match classify_user_confirmation(message) {
        None => Some(FixedSentence::ConfirmationUnclear.for_language(&session.language).to_owned()),
        Some(false) => {
            state_manager::clear_pending_confirmation(session, &acc.trace, false);
            Some(FixedSentence::ConfirmationCancelled.for_language(&session.language).to_owned())
        }
        Some(true) => {
            state_manager::clear_pending_confirmation(session, &acc.trace, true);
            let Some(route) = engine.registry.get_tool_routing(&pending.tool_name) else {
                return Some(FixedSentence::ConfirmationUnclear.for_language(&session.language).to_owned());
            };
            let params = pending.tool_params.as_object().cloned().unwrap_or_default();
            let flow_state_data = session
                .current_flow
                .as_ref()
                .map(|f| f.state_data.clone().into_iter().collect())
                .unwrap_or_default();
            let result = engine
                .tool_executor
                .execute(
                    &route.tool,
                    ToolCallParams { params, skip_confirmation: true, flow_state_data },
                    user_id,
                    &session.language,
                )
                .await;
            acc.tool_calls.push(pending.tool_name.clone());
            if !result.success {
                let message = format!(
                    "I couldn't complete that: {}",
                    result.error.clone().unwrap_or_else(|| "something went wrong.".into())
                );
                if let Some(flow_transition) = &route.tool.flow_transition {
                    if let Some(target) = &flow_transition.on_error {
                        if let Some(rendered) = apply_flow_transition(engine, session, &acc.trace, target) {
                            return Some(rendered);
                        }
                    }
                }
                return Some(message);
            }
            if let Some(flow_transition) = &route.tool.flow_transition {
                if let Some(target) = &flow_transition.on_success {
                    if let Some(rendered) = apply_flow_transition(engine, session, &acc.trace, target) {
                        return Some(rendered);
                    }
                }
            }
            Some(format_tool_success(engine, &pending.tool_name, result.data.as_ref()))
        }
    }
}
