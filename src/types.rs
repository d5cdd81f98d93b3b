//! Core data model shared across the orchestration pipeline.
//!
//! These types correspond 1:1 to the specification's data model: agent
//! descriptors, the plan produced by the query planner, the bindings the
//! matcher produces, and the per-agent execution bookkeeping the scheduler
//! maintains. Nothing here talks to an external service — that is the job of
//! the [`AgentInvoker`](crate::worker::AgentInvoker) and
//! [`ReasoningLlm`](crate::llm::ReasoningLlm) traits.

use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Lifecycle status of a registered agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Active,
    Inactive,
}

/// A snapshot of a worker agent's registration, as handed to the core by the
/// external Agent Registry / Backend Manager at session start. Immutable for
/// the lifetime of the session.
#[derive(Debug, Clone)]
pub struct AgentDescriptor {
    pub agent_id: String,
    pub name: String,
    pub model: String,
    pub capabilities: HashSet<String>,
    pub keywords: Vec<String>,
    pub domain: String,
    pub specialization: String,
    pub status: AgentStatus,
    pub backend_endpoint: String,
    pub max_context_length: usize,
    pub preferred_context_format: String,
}

impl AgentDescriptor {
    /// Convenience constructor with the documented default
    /// (`max_context_length = 1000`, `preferred_context_format = "structured"`).
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            model: model.into(),
            capabilities: HashSet::new(),
            keywords: Vec::new(),
            domain: String::new(),
            specialization: String::new(),
            status: AgentStatus::Active,
            backend_endpoint: String::new(),
            max_context_length: 1000,
            preferred_context_format: String::from("structured"),
        }
    }

    pub fn with_capabilities(mut self, caps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_keywords(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    pub fn with_specialization(mut self, specialization: impl Into<String>) -> Self {
        self.specialization = specialization.into();
        self
    }
}

/// Complexity tier assigned to a plan by the query planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

/// The shape of collaboration a plan calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPattern {
    SingleAgent,
    MultiAgent,
    VaryingDomain,
}

/// The scheduler's dispatch mode for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Single,
    Sequential,
    Parallel,
    Hybrid,
}

/// One step of a [`Plan`]'s workflow.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub step_id: String,
    pub description: String,
    pub required_capability: String,
    pub execution_order: usize,
    pub dependencies: Vec<String>,
}

/// The structured decomposition of a user query, produced by the query
/// planner (`C5`) and consumed by the matcher (`C6`), dependency builder
/// (`C7`), and scheduler (`C8`).
#[derive(Debug, Clone)]
pub struct Plan {
    pub query: String,
    pub intent: String,
    pub domain: String,
    pub complexity: Complexity,
    pub workflow_pattern: WorkflowPattern,
    pub orchestration_strategy: Strategy,
    pub steps: Vec<WorkflowStep>,
    pub success_criteria: String,
    pub reasoning: String,
}

/// The binding between one workflow step and the agent selected to perform
/// it, produced by the matcher (`C6`).
#[derive(Debug, Clone)]
pub struct TaskAssignment {
    pub step_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub relevance_score: f32,
    pub input_context_hint: String,
    pub output_context_hint: String,
    pub priority: Priority,
    /// Step ids this assignment depends on (resolved to stepIDs per the
    /// spec's open question on dependency shape).
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// Terminal/in-flight status of a single agent's execution within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
}

impl ExecutionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ExecutionStatus::Pending | ExecutionStatus::Running)
    }
}

/// Per-session, per-agent execution bookkeeping. Created when the scheduler
/// dispatches an agent; terminal on completion or failure.
#[derive(Debug, Clone)]
pub struct AgentExecutionRecord {
    pub agent_id: String,
    pub raw_output: String,
    pub cleaned_output: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub execution_time_ms: Option<i64>,
    pub status: ExecutionStatus,
    pub error: Option<String>,
    pub quality_score: f32,
    pub tools_used: Vec<String>,
}

impl AgentExecutionRecord {
    pub fn pending(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            raw_output: String::new(),
            cleaned_output: String::new(),
            start_time: Utc::now(),
            end_time: None,
            execution_time_ms: None,
            status: ExecutionStatus::Pending,
            error: None,
            quality_score: 0.0,
            tools_used: Vec::new(),
        }
    }
}
