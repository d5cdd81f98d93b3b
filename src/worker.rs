//! The Worker Agent Service boundary.
//!
//! The orchestration core never talks to a real LLM-backed worker directly —
//! it only knows about [`AgentInvoker`], exactly as the teacher crate keeps
//! vendor specifics behind `ClientWrapper` and lets `Agent` / `Orchestration`
//! stay provider-agnostic. A host application implements this trait against
//! its actual Worker Agent Service (HTTP call, local process, whatever) and
//! hands an `Arc<dyn AgentInvoker>` to the
//! [`ExecutionScheduler`](crate::scheduler::ExecutionScheduler).

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;

/// A single worker invocation's raw result.
#[derive(Debug, Clone)]
pub struct WorkerOutcome {
    /// Verbatim text returned by the worker. Never cleaned here — cleaning
    /// is the text cleaner's job (`C3`).
    pub raw_output: String,
    /// Tool names the worker reports having used, if any.
    pub tools_used: Vec<String>,
}

/// Abstracts a single worker-agent invocation: `Execute(agentID, prompt, ctx)
/// → response` per the specification's scope boundary.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Invoke `agent_id` with `prompt`. Implementations must respect
    /// cooperative cancellation via `cancel` and should return
    /// [`WorkerError::Transport`] for retryable failures (timeouts, 5xx) and
    /// [`WorkerError::AgentFailure`] for terminal ones (4xx, `success:
    /// false`) so the scheduler's retry policy (§4.4) can tell them apart.
    async fn invoke(
        &self,
        agent_id: &str,
        prompt: &str,
        cancel: CancellationToken,
    ) -> Result<WorkerOutcome, WorkerError>;
}
