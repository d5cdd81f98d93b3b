//! The top-level `Orchestrator`: wires `C1`–`C10` together behind a single
//! entry point, `orchestrate`. Owns the agent registry, tracer, and context
//! refinement engine across the process lifetime; builds a fresh plan,
//! agent selection, dependency graph, and scheduler run per call.
//!
//! Owns trace lifecycle exclusively: it is the only caller of
//! [`Tracer::start_trace`]/[`Tracer::complete_trace`]. The scheduler only
//! logs events into a trace this function has already opened, so a session
//! id is never double-started (which would silently replace the active
//! trace entry and drop any events logged in between).

use std::sync::Arc;

use log::{info, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent_store::AgentDescriptorStore;
use crate::config::OrchestratorConfig;
use crate::dependency::{self, Dag};
use crate::error::OrchestratorError;
use crate::llm::ReasoningLlm;
use crate::matcher;
use crate::memory::ReflectionSummary;
use crate::planner;
use crate::refinement::ContextRefinementEngine;
use crate::scheduler::{self, ExecutionScheduler};
use crate::synthesizer;
use crate::tracer::Tracer;
use crate::types::{AgentExecutionRecord, Plan, Strategy, TaskAssignment};
use crate::worker::AgentInvoker;
use std::collections::HashMap;

/// Everything a caller gets back from one `orchestrate` call.
pub struct OrchestrationOutcome {
    pub session_id: String,
    pub plan: Plan,
    pub final_strategy: Strategy,
    pub assignments: Vec<TaskAssignment>,
    pub records: HashMap<String, AgentExecutionRecord>,
    pub reflection: ReflectionSummary,
    pub answer: String,
    /// True if the session ran to completion with at least one cancelled,
    /// failed, or timed-out agent alongside at least one completed one.
    pub partial: bool,
}

/// The multi-agent orchestration runtime. Cheap to clone via `Arc` fields;
/// intended to be constructed once per process and shared across requests.
pub struct Orchestrator {
    agents: Arc<AgentDescriptorStore>,
    tracer: Arc<Tracer>,
    refinement: Arc<ContextRefinementEngine>,
    scheduler: ExecutionScheduler,
    llm: Arc<dyn ReasoningLlm>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        agents: Arc<AgentDescriptorStore>,
        invoker: Arc<dyn AgentInvoker>,
        llm: Arc<dyn ReasoningLlm>,
        config: OrchestratorConfig,
    ) -> Self {
        let tracer = Arc::new(Tracer::new());
        let refinement = Arc::new(ContextRefinementEngine::new());
        let scheduler = ExecutionScheduler::new(invoker, llm.clone(), tracer.clone(), refinement.clone(), &config);
        Self {
            agents,
            tracer,
            refinement,
            scheduler,
            llm,
            config,
        }
    }

    /// Construct with an externally-owned tracer, e.g. one a host wants to
    /// also expose over its own HTTP surface via [`Tracer::list_recent`].
    pub fn with_tracer(
        agents: Arc<AgentDescriptorStore>,
        invoker: Arc<dyn AgentInvoker>,
        llm: Arc<dyn ReasoningLlm>,
        tracer: Arc<Tracer>,
        config: OrchestratorConfig,
    ) -> Self {
        let refinement = Arc::new(ContextRefinementEngine::new());
        let scheduler = ExecutionScheduler::new(invoker, llm.clone(), tracer.clone(), refinement.clone(), &config);
        Self {
            agents,
            tracer,
            refinement,
            scheduler,
            llm,
            config,
        }
    }

    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    pub fn refinement(&self) -> &Arc<ContextRefinementEngine> {
        &self.refinement
    }

    pub fn agents(&self) -> &Arc<AgentDescriptorStore> {
        &self.agents
    }

    /// Run the full pipeline for `query`: plan, match, build dependencies,
    /// schedule execution, reflect, and synthesize a final answer.
    ///
    /// `session_id` lets a caller correlate this run with an externally
    /// generated id (e.g. an HTTP request id); a fresh UUID is used if
    /// omitted.
    pub async fn orchestrate(
        &self,
        query: &str,
        session_id: Option<String>,
        cancel: CancellationToken,
    ) -> Result<OrchestrationOutcome, OrchestratorError> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());

        let snapshot = self.agents.snapshot().await;
        if snapshot.is_empty() {
            return Err(OrchestratorError::NoAgentsRegistered);
        }

        let plan = planner::plan(query, self.llm.as_ref(), &self.config).await?;

        let (selected, assignments, scores) = matcher::select(&plan, &snapshot, &self.config);
        if selected.is_empty() || assignments.is_empty() {
            return Err(OrchestratorError::NoAgentsSelectable);
        }

        let build_result = dependency::build(&selected, &assignments, &plan, &self.config.capability_dependencies, &scores);
        let dag = build_result.dag;

        let (strategy, _downgraded) = scheduler::determine_strategy(&plan, &dag, selected.len());
        self.tracer.start_trace(&session_id, query, scheduler::strategy_name(strategy)).await;

        if let Some((from, to)) = &build_result.cycle_broken {
            self.log_cycle_broken(&session_id, from, to).await;
        }

        let outcome = self
            .run_and_synthesize(&plan, &selected, &assignments, &dag, &session_id, cancel)
            .await;

        let (answer, final_strategy, records, reflection, partial, success, error) = outcome;

        self.tracer
            .complete_trace(&session_id, Some(answer.clone()), success, error)
            .await;

        info!(
            "orchestration {} complete: strategy={:?} agents={} partial={}",
            session_id,
            final_strategy,
            records.len(),
            partial
        );

        Ok(OrchestrationOutcome {
            session_id,
            plan,
            final_strategy,
            assignments,
            records,
            reflection,
            answer,
            partial,
        })
    }

    async fn log_cycle_broken(&self, session_id: &str, from: &str, to: &str) {
        self.tracer
            .log_error(
                session_id,
                &format!("dependency cycle detected, dropped edge {} -> {}", from, to),
                "dependency_cycle",
            )
            .await;
    }

    #[allow(clippy::type_complexity)]
    async fn run_and_synthesize(
        &self,
        plan: &Plan,
        selected: &[crate::types::AgentDescriptor],
        assignments: &[TaskAssignment],
        dag: &Dag,
        session_id: &str,
        cancel: CancellationToken,
    ) -> (
        String,
        Strategy,
        HashMap<String, AgentExecutionRecord>,
        ReflectionSummary,
        bool,
        bool,
        Option<String>,
    ) {
        let result = self
            .scheduler
            .run(plan, selected, assignments, dag, session_id, &self.config, cancel)
            .await;

        let reflection = result.memory.reflect();

        if result.memory.is_empty() {
            warn!("orchestration {} produced no agent output", session_id);
            return (
                String::new(),
                result.final_strategy,
                result.records,
                reflection,
                result.partial,
                false,
                Some("no agent produced output".to_string()),
            );
        }

        if result.partial && !self.config.synthesize_on_partial {
            return (
                String::new(),
                result.final_strategy,
                result.records,
                reflection,
                result.partial,
                false,
                Some("session ended partially and synthesis on partial results is disabled".to_string()),
            );
        }

        let answer = synthesizer::synthesize(plan, &result.memory, Some(&reflection), self.llm.as_ref(), &self.config).await;
        let success = !answer.is_empty();

        (answer, result.final_strategy, result.records, reflection, result.partial, success, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ReasoningError, WorkerError};
    use crate::types::{AgentDescriptor, ExecutionStatus};
    use crate::worker::WorkerOutcome;
    use async_trait::async_trait;

    struct EchoInvoker;

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke(&self, agent_id: &str, prompt: &str, _cancel: CancellationToken) -> Result<WorkerOutcome, WorkerError> {
            Ok(WorkerOutcome {
                raw_output: format!("{} handled: {}", agent_id, prompt),
                tools_used: Vec::new(),
            })
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl ReasoningLlm for FailingLlm {
        async fn complete(&self, _prompt: &str, _opts: crate::llm::CompletionOptions) -> Result<String, ReasoningError> {
            Err(ReasoningError("no reasoning llm in test".to_string()))
        }
    }

    #[tokio::test]
    async fn orchestrate_fails_fast_with_no_agents_registered() {
        let agents = Arc::new(AgentDescriptorStore::new());
        let orchestrator = Orchestrator::new(agents, Arc::new(EchoInvoker), Arc::new(FailingLlm), OrchestratorConfig::default());
        let result = orchestrator.orchestrate("hello", None, CancellationToken::new()).await;
        assert!(matches!(result, Err(OrchestratorError::NoAgentsRegistered)));
    }

    #[tokio::test]
    async fn orchestrate_single_agent_creative_query_end_to_end() {
        let agents = Arc::new(AgentDescriptorStore::new());
        agents
            .register(
                AgentDescriptor::new("creative-1", "CreativeAssistant", "model")
                    .with_capabilities(["creative", "poetry"])
                    .with_domain("creative"),
            )
            .await;

        let orchestrator = Orchestrator::new(agents, Arc::new(EchoInvoker), Arc::new(FailingLlm), OrchestratorConfig::default());
        let outcome = orchestrator
            .orchestrate("Write me a short poem about rain.", None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome.final_strategy, Strategy::Single);
        assert_eq!(outcome.records.len(), 1);
        assert!(!outcome.answer.is_empty());
        assert!(!outcome.partial);

        let trace = orchestrator.tracer().get_trace(&outcome.session_id).await.unwrap();
        assert!(trace.success);
        assert_eq!(trace.agents_involved.len(), 1);
    }

    #[tokio::test]
    async fn orchestrate_fails_when_no_agent_matches_any_step() {
        let agents = Arc::new(AgentDescriptorStore::new());
        agents
            .register(AgentDescriptor::new("weather-1", "WeatherAgent", "model").with_domain("weather"))
            .await;

        let mut config = OrchestratorConfig::default();
        config.min_agent_score_threshold = 2.0;

        let orchestrator = Orchestrator::new(agents, Arc::new(EchoInvoker), Arc::new(FailingLlm), config);
        let outcome = orchestrator.orchestrate("Write me a short poem.", None, CancellationToken::new()).await;
        assert!(outcome.is_ok(), "matcher always falls back to a global best scorer even under threshold");
        let outcome = outcome.unwrap();
        assert_eq!(outcome.records.values().next().unwrap().status, ExecutionStatus::Completed);
    }
}
