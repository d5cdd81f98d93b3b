//! Error types for the orchestration engine.
//!
//! Each component exposes its own error enum (mirroring
//! [`OrchestrationError`](crate) in the teacher crate this runtime grew out
//! of) rather than reaching for a derive-macro crate. [`OrchestratorError`]
//! aggregates the terminal ones — the kinds that actually abort a session per
//! the propagation policy in the specification's error-handling section.
//! Recoverable errors (refinement failure, synthesis failure, a single
//! agent's invocation failure) are handled locally by the component that
//! produced them and never appear here.

use std::error::Error;
use std::fmt;

/// A planner failure: neither the reasoning LLM nor the heuristic fallback
/// produced a plan with at least one step.
#[derive(Debug, Clone)]
pub struct PlanError(pub String);

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "plan error: {}", self.0)
    }
}

impl Error for PlanError {}

/// Raised by the external worker boundary (`AgentInvoker`).
#[derive(Debug, Clone)]
pub enum WorkerError {
    /// Transport-level failure (timeout, connection reset, 5xx). Retryable.
    Transport(String),
    /// The agent itself reported failure (4xx, or `success: false`). Not retryable.
    AgentFailure(String),
    /// The invocation was cancelled cooperatively.
    Cancelled,
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerError::Transport(msg) => write!(f, "transport error: {}", msg),
            WorkerError::AgentFailure(msg) => write!(f, "agent failure: {}", msg),
            WorkerError::Cancelled => write!(f, "invocation cancelled"),
        }
    }
}

impl Error for WorkerError {}

/// Raised by the external reasoning-LLM boundary (`ReasoningLlm`).
#[derive(Debug, Clone)]
pub struct ReasoningError(pub String);

impl fmt::Display for ReasoningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reasoning LLM error: {}", self.0)
    }
}

impl Error for ReasoningError {}

/// Terminal errors that abort an orchestration session.
///
/// Everything else (`AgentInvocationError`, `AgentTimeout`, `RefinementError`,
/// `SynthesisError`, `CycleDetected`) is recorded on the relevant
/// per-agent/per-handoff record and observed only through the trace.
#[derive(Debug, Clone)]
pub enum OrchestratorError {
    /// The planner could not produce a usable plan.
    Plan(PlanError),
    /// Zero agents were registered in the snapshot taken at session start.
    NoAgentsRegistered,
    /// Agents were registered but none were selectable for any step.
    NoAgentsSelectable,
    /// The session was cancelled and no agent produced output to synthesize from.
    SessionCancelled,
}

impl fmt::Display for OrchestratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrchestratorError::Plan(e) => write!(f, "{}", e),
            OrchestratorError::NoAgentsRegistered => write!(f, "no agents available: none registered"),
            OrchestratorError::NoAgentsSelectable => {
                write!(f, "no agents available: none selectable for this plan")
            }
            OrchestratorError::SessionCancelled => {
                write!(f, "session cancelled with no completed agent output")
            }
        }
    }
}

impl Error for OrchestratorError {}

impl From<PlanError> for OrchestratorError {
    fn from(e: PlanError) -> Self {
        OrchestratorError::Plan(e)
    }
}
