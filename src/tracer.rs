//! `C2` — the Observability Tracer.
//!
//! All state mutation funnels through a single mutex-guarded [`Tracer`],
//! matching the specification's ordering guarantee that "within a session,
//! events in the trace are totally ordered by their arrival at the tracer
//! (single-mutex serialization)". Traces move from `active` to `completed` on
//! termination; metrics are updated incrementally with online averages, the
//! same technique the original Python `A2AObservabilityEngine` uses for
//! `average_execution_time` / `average_handoffs_per_orchestration`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Append-only observability event. Never mutated after logging.
#[derive(Debug, Clone)]
pub struct Event {
    pub event_id: String,
    pub session_id: String,
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub agent_id: Option<String>,
    pub content: Option<String>,
    pub metadata: HashMap<String, String>,
    pub execution_time_ms: Option<i64>,
    pub status: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    OrchestrationStart,
    QueryAnalysis,
    AgentSelection,
    AgentHandoffStart,
    AgentHandoffComplete,
    ContextTransfer,
    AgentExecutionStart,
    AgentExecutionComplete,
    ToolUsage,
    ErrorOccurred,
    OrchestrationComplete,
    ResponseSynthesis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandoffStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Timeout,
}

/// Tracking record for a single agent handoff (one invocation of a worker
/// agent within a session).
#[derive(Debug, Clone)]
pub struct HandoffRecord {
    pub handoff_id: String,
    pub session_id: String,
    pub from_agent_id: String,
    pub to_agent_id: String,
    pub handoff_number: usize,
    pub status: HandoffStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub context_transferred: String,
    pub input_prepared: String,
    pub output_received: Option<String>,
    pub tools_used: Vec<String>,
    pub error: Option<String>,
}

/// Aggregated observability record for one session's lifecycle.
#[derive(Debug, Clone)]
pub struct ConversationTrace {
    pub session_id: String,
    pub query: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_execution_time_ms: Option<i64>,
    pub agents_involved: Vec<String>,
    pub handoffs: Vec<HandoffRecord>,
    pub events: Vec<Event>,
    pub final_response: Option<String>,
    pub success: bool,
    pub error: Option<String>,
    pub orchestration_strategy: Option<String>,
    pub context_evolution: Vec<ContextTransferSnapshot>,
}

/// One entry in a trace's `context_evolution` — a snapshot of a context
/// transfer between two agents, addressable via
/// `/traces/{sessionID}/context-evolution` on a host's HTTP surface.
#[derive(Debug, Clone)]
pub struct ContextTransferSnapshot {
    pub timestamp: DateTime<Utc>,
    pub from_agent: String,
    pub to_agent: String,
    pub transfer_type: String,
    pub context_size: usize,
}

/// Online, incrementally-updated aggregate metrics.
#[derive(Debug, Clone, Default)]
pub struct Metrics {
    pub total_orchestrations: u64,
    pub successful_orchestrations: u64,
    pub failed_orchestrations: u64,
    pub average_execution_time_ms: f64,
    pub average_handoffs_per_orchestration: f64,
    /// Per-agent invocation counter (supplements the base spec's metrics —
    /// grounded in the original `most_used_agents` histogram).
    pub agent_usage: HashMap<String, u64>,
}

/// Pluggable export sink for completed traces. Absence of a sink is valid —
/// trace durability beyond process lifetime is optional per the
/// specification's non-goals.
pub trait TraceSink: Send + Sync {
    fn export(&self, trace: &ConversationTrace);
}

/// The single mutex-guarded tracer. All mutation goes through `&self`
/// methods that briefly acquire the lock and never hold it across an I/O
/// call, per the concurrency model in §5.
pub struct Tracer {
    state: Mutex<TracerState>,
    sink: Option<Box<dyn TraceSink>>,
}

#[derive(Default)]
struct TracerState {
    active: HashMap<String, ConversationTrace>,
    completed: HashMap<String, ConversationTrace>,
    metrics: Metrics,
}

impl Tracer {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TracerState::default()),
            sink: None,
        }
    }

    pub fn with_sink(sink: Box<dyn TraceSink>) -> Self {
        Self {
            state: Mutex::new(TracerState::default()),
            sink: Some(sink),
        }
    }

    pub async fn start_trace(&self, session_id: &str, query: &str, strategy: &str) {
        let trace = ConversationTrace {
            session_id: session_id.to_string(),
            query: query.to_string(),
            start_time: Utc::now(),
            end_time: None,
            total_execution_time_ms: None,
            agents_involved: Vec::new(),
            handoffs: Vec::new(),
            events: Vec::new(),
            final_response: None,
            success: false,
            error: None,
            orchestration_strategy: Some(strategy.to_string()),
            context_evolution: Vec::new(),
        };
        let mut state = self.state.lock().await;
        state.active.insert(session_id.to_string(), trace);
        drop(state);
        self.log_event(
            session_id,
            EventType::OrchestrationStart,
            None,
            Some(format!("Starting {} orchestration", strategy)),
            HashMap::new(),
        )
        .await;
    }

    pub async fn log_event(
        &self,
        session_id: &str,
        event_type: EventType,
        agent_id: Option<String>,
        content: Option<String>,
        metadata: HashMap<String, String>,
    ) {
        let event = Event {
            event_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            event_type,
            timestamp: Utc::now(),
            agent_id,
            content,
            metadata,
            execution_time_ms: None,
            status: None,
            error: None,
        };
        let mut state = self.state.lock().await;
        if let Some(trace) = state.active.get_mut(session_id) {
            trace.events.push(event);
        }
    }

    pub async fn log_error(&self, session_id: &str, error: &str, kind: &str) {
        let mut metadata = HashMap::new();
        metadata.insert("kind".to_string(), kind.to_string());
        let event = Event {
            event_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            event_type: EventType::ErrorOccurred,
            timestamp: Utc::now(),
            agent_id: None,
            content: None,
            metadata,
            execution_time_ms: None,
            status: Some("failed".to_string()),
            error: Some(error.to_string()),
        };
        let mut state = self.state.lock().await;
        if let Some(trace) = state.active.get_mut(session_id) {
            trace.events.push(event);
        }
    }

    /// Begin tracking a handoff; only the agent-facing direction counts as a
    /// handoff (the spec's resolution of the source's double-logged
    /// orchestrator↔agent transitions). `to_agent_name` is the worker's
    /// display name, recorded into `agents_involved` — the orchestrator
    /// pseudo-agent and agent ids never appear there, matching
    /// `SessionMemory.cleaned`'s keying by agent name.
    #[allow(clippy::too_many_arguments)]
    pub async fn start_handoff(
        &self,
        session_id: &str,
        from_agent_id: &str,
        to_agent_id: &str,
        to_agent_name: &str,
        handoff_number: usize,
        context_transferred: String,
        input_prepared: String,
    ) -> String {
        let handoff_id = Uuid::new_v4().to_string();
        let record = HandoffRecord {
            handoff_id: handoff_id.clone(),
            session_id: session_id.to_string(),
            from_agent_id: from_agent_id.to_string(),
            to_agent_id: to_agent_id.to_string(),
            handoff_number,
            status: HandoffStatus::InProgress,
            start_time: Utc::now(),
            end_time: None,
            context_transferred: context_transferred.clone(),
            input_prepared,
            output_received: None,
            tools_used: Vec::new(),
            error: None,
        };

        let mut state = self.state.lock().await;
        if let Some(trace) = state.active.get_mut(session_id) {
            trace.handoffs.push(record);
            if !trace.agents_involved.iter().any(|a| a == to_agent_name) {
                trace.agents_involved.push(to_agent_name.to_string());
            }
        }
        drop(state);

        let mut metadata = HashMap::new();
        metadata.insert("handoff_id".to_string(), handoff_id.clone());
        metadata.insert("handoff_number".to_string(), handoff_number.to_string());
        self.log_event(
            session_id,
            EventType::AgentHandoffStart,
            Some(to_agent_id.to_string()),
            Some(format!(
                "Handoff #{}: {} -> {}",
                handoff_number, from_agent_id, to_agent_id
            )),
            metadata,
        )
        .await;

        handoff_id
    }

    pub async fn complete_handoff(
        &self,
        session_id: &str,
        handoff_id: &str,
        output: Option<String>,
        tools_used: Vec<String>,
        error: Option<String>,
        timed_out: bool,
    ) {
        let mut state = self.state.lock().await;
        if let Some(trace) = state.active.get_mut(session_id) {
            if let Some(h) = trace.handoffs.iter_mut().find(|h| h.handoff_id == handoff_id) {
                h.end_time = Some(Utc::now());
                h.output_received = output;
                h.tools_used = tools_used;
                h.error = error.clone();
                h.status = if timed_out {
                    HandoffStatus::Timeout
                } else if error.is_some() {
                    HandoffStatus::Failed
                } else {
                    HandoffStatus::Completed
                };
            }
        }
        drop(state);

        let mut metadata = HashMap::new();
        metadata.insert("handoff_id".to_string(), handoff_id.to_string());
        self.log_event(
            session_id,
            EventType::AgentHandoffComplete,
            None,
            Some(format!("Handoff {} completed", handoff_id)),
            metadata,
        )
        .await;
    }

    pub async fn log_context_transfer(
        &self,
        session_id: &str,
        from_agent: &str,
        to_agent: &str,
        context_size: usize,
        transfer_type: &str,
    ) {
        let snapshot = ContextTransferSnapshot {
            timestamp: Utc::now(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            transfer_type: transfer_type.to_string(),
            context_size,
        };
        let mut state = self.state.lock().await;
        if let Some(trace) = state.active.get_mut(session_id) {
            trace.context_evolution.push(snapshot);
        }
        drop(state);

        let mut metadata = HashMap::new();
        metadata.insert("transfer_type".to_string(), transfer_type.to_string());
        metadata.insert("context_size".to_string(), context_size.to_string());
        self.log_event(
            session_id,
            EventType::ContextTransfer,
            None,
            Some(format!("Context transferred: {}", transfer_type)),
            metadata,
        )
        .await;
    }

    /// Finalize a session's trace, move it to `completed`, and update
    /// metrics online (no re-scan of history, matching the Python source's
    /// incremental-average approach).
    pub async fn complete_trace(&self, session_id: &str, final_response: Option<String>, success: bool, error: Option<String>) {
        let mut state = self.state.lock().await;
        let mut trace = match state.active.remove(session_id) {
            Some(t) => t,
            None => return,
        };

        trace.end_time = Some(Utc::now());
        trace.total_execution_time_ms =
            Some((trace.end_time.unwrap() - trace.start_time).num_milliseconds());
        trace.final_response = final_response;
        trace.success = success;
        trace.error = error;

        let n = state.metrics.total_orchestrations + 1;
        state.metrics.total_orchestrations = n;
        if trace.success {
            state.metrics.successful_orchestrations += 1;
        } else {
            state.metrics.failed_orchestrations += 1;
        }

        let exec_ms = trace.total_execution_time_ms.unwrap_or(0) as f64;
        state.metrics.average_execution_time_ms +=
            (exec_ms - state.metrics.average_execution_time_ms) / n as f64;

        let handoffs = trace.handoffs.len() as f64;
        state.metrics.average_handoffs_per_orchestration +=
            (handoffs - state.metrics.average_handoffs_per_orchestration) / n as f64;

        for agent in &trace.agents_involved {
            *state.metrics.agent_usage.entry(agent.clone()).or_insert(0) += 1;
        }

        // Append the terminal event into `trace` directly rather than via
        // `log_event`, which only ever writes into `state.active` — by this
        // point the trace has already been removed from there, so a
        // post-move `log_event` call would silently drop the event and the
        // stored trace would never end with `orchestration_complete`.
        let mut metadata = HashMap::new();
        metadata.insert("success".to_string(), success.to_string());
        trace.events.push(Event {
            event_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            event_type: EventType::OrchestrationComplete,
            timestamp: Utc::now(),
            agent_id: None,
            content: Some("Orchestration completed".to_string()),
            metadata,
            execution_time_ms: trace.total_execution_time_ms,
            status: None,
            error: None,
        });

        state.completed.insert(session_id.to_string(), trace.clone());
        drop(state);

        if let Some(sink) = &self.sink {
            sink.export(&trace);
        }
    }

    pub async fn get_trace(&self, session_id: &str) -> Option<ConversationTrace> {
        let state = self.state.lock().await;
        state
            .active
            .get(session_id)
            .or_else(|| state.completed.get(session_id))
            .cloned()
    }

    pub async fn list_recent(&self, limit: usize) -> Vec<ConversationTrace> {
        let state = self.state.lock().await;
        let mut traces: Vec<_> = state.completed.values().cloned().collect();
        traces.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        traces.truncate(limit);
        traces
    }

    pub async fn metrics(&self) -> Metrics {
        let state = self.state.lock().await;
        state.metrics.clone()
    }

    pub async fn active_session_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    pub async fn completed_session_count(&self) -> usize {
        self.state.lock().await.completed.len()
    }
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON-serializable snapshot of a trace, grounded in the original Python
/// source's `export_trace_data` — useful to a pluggable sink without
/// requiring one.
pub fn export_trace(trace: &ConversationTrace) -> serde_json::Value {
    serde_json::json!({
        "session_id": trace.session_id,
        "query": trace.query,
        "start_time": trace.start_time.to_rfc3339(),
        "end_time": trace.end_time.map(|t| t.to_rfc3339()),
        "total_execution_time_ms": trace.total_execution_time_ms,
        "success": trace.success,
        "error": trace.error,
        "orchestration_strategy": trace.orchestration_strategy,
        "agents_involved": trace.agents_involved,
        "handoff_count": trace.handoffs.len(),
        "event_count": trace.events.len(),
        "final_response": trace.final_response,
    })
}
