//! `C8` — the Execution Scheduler.
//!
//! `Run(plan, selected, dag, query, sessionID) -> ExecutionResult`. Owns the
//! strategy determination rules in §4.4, the four dispatch algorithms
//! (single/sequential/parallel/hybrid), the per-invocation lifecycle
//! (handoff → context transfer → execution → retry/timeout → completion),
//! and the bounded-concurrency model from §5 (`Semaphore`-guarded, global
//! and per-session).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::dependency::Dag;
use crate::error::WorkerError;
use crate::llm::ReasoningLlm;
use crate::memory::SessionMemory;
use crate::refinement::ContextRefinementEngine;
use crate::tracer::Tracer;
use crate::types::{
    AgentDescriptor, AgentExecutionRecord, ExecutionStatus, Plan, Strategy, TaskAssignment, WorkflowPattern,
    WorkflowStep,
};
use crate::worker::AgentInvoker;

const RETRY_BACKOFF: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(2)];
const MAX_ATTEMPTS: u32 = 3;
const CONTEXT_TRUNCATE_LEN: usize = 800;

/// Outcome of running the scheduler against a full plan.
pub struct ExecutionResult {
    pub memory: SessionMemory,
    pub records: HashMap<String, AgentExecutionRecord>,
    pub final_strategy: Strategy,
    /// True when the session was cancelled, or some agent failed/timed out,
    /// while at least one other agent still produced output.
    pub partial: bool,
}

struct AttemptResult {
    raw_output: String,
    tools_used: Vec<String>,
    status: ExecutionStatus,
    error: Option<String>,
}

/// Lookup tables built once per run from the plan and the matcher's output,
/// threaded through every dispatch algorithm.
struct RunIndex<'a> {
    agent_by_id: HashMap<&'a str, &'a AgentDescriptor>,
    assignment_by_agent: HashMap<&'a str, &'a TaskAssignment>,
    assignment_by_step: HashMap<&'a str, &'a TaskAssignment>,
    step_by_id: HashMap<&'a str, &'a WorkflowStep>,
}

impl<'a> RunIndex<'a> {
    fn build(plan: &'a Plan, selected: &'a [AgentDescriptor], assignments: &'a [TaskAssignment]) -> Self {
        Self {
            agent_by_id: selected.iter().map(|a| (a.agent_id.as_str(), a)).collect(),
            assignment_by_agent: assignments.iter().map(|a| (a.agent_id.as_str(), a)).collect(),
            assignment_by_step: assignments.iter().map(|a| (a.step_id.as_str(), a)).collect(),
            step_by_id: plan.steps.iter().map(|s| (s.step_id.as_str(), s)).collect(),
        }
    }
}

pub struct ExecutionScheduler {
    invoker: Arc<dyn AgentInvoker>,
    llm: Arc<dyn ReasoningLlm>,
    tracer: Arc<Tracer>,
    refinement: Arc<ContextRefinementEngine>,
    global_semaphore: Arc<Semaphore>,
}

impl ExecutionScheduler {
    pub fn new(
        invoker: Arc<dyn AgentInvoker>,
        llm: Arc<dyn ReasoningLlm>,
        tracer: Arc<Tracer>,
        refinement: Arc<ContextRefinementEngine>,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            invoker,
            llm,
            tracer,
            refinement,
            global_semaphore: Arc::new(Semaphore::new(config.max_in_flight_agents)),
        }
    }

    pub async fn run(
        &self,
        plan: &Plan,
        selected: &[AgentDescriptor],
        assignments: &[TaskAssignment],
        dag: &Dag,
        session_id: &str,
        config: &OrchestratorConfig,
        cancel: CancellationToken,
    ) -> ExecutionResult {
        let (strategy, downgraded) = determine_strategy(plan, dag, selected.len());

        if downgraded {
            self.tracer
                .log_error(session_id, "parallel strategy downgraded to hybrid: DAG has edges", "strategy_downgrade")
                .await;
        }

        let index = RunIndex::build(plan, selected, assignments);

        let mut memory = SessionMemory::new(session_id);
        let mut records: HashMap<String, AgentExecutionRecord> = HashMap::new();
        let mut cancelled_any;

        match strategy {
            Strategy::Single => {
                cancelled_any = false;
                if let Some(assignment) = assignments.first() {
                    if let Some(agent) = index.agent_by_id.get(assignment.agent_id.as_str()) {
                        let record = self
                            .execute_one(session_id, agent, assignment, &plan.query, 0, &mut memory, config, cancel.clone())
                            .await;
                        if record.status == ExecutionStatus::Cancelled {
                            cancelled_any = true;
                        }
                        records.insert(assignment.agent_id.clone(), record);
                    }
                }
            }
            Strategy::Sequential => {
                cancelled_any = self
                    .run_sequential(plan, &index, dag, session_id, &mut memory, &mut records, config, cancel.clone())
                    .await;
            }
            Strategy::Parallel => {
                cancelled_any = self
                    .run_parallel(plan, selected, &index, session_id, &mut memory, &mut records, config, cancel.clone())
                    .await;
            }
            Strategy::Hybrid => {
                cancelled_any = self
                    .run_hybrid(plan, selected, &index, dag, session_id, &mut memory, &mut records, config, cancel.clone())
                    .await;
            }
        }

        let any_completed = records.values().any(|r| r.status == ExecutionStatus::Completed);
        let any_non_completed_terminal = records.values().any(|r| r.status.is_terminal() && r.status != ExecutionStatus::Completed);
        let partial = (cancelled_any || any_non_completed_terminal) && any_completed;

        ExecutionResult {
            memory,
            records,
            final_strategy: strategy,
            partial,
        }
    }

    async fn run_sequential(
        &self,
        plan: &Plan,
        index: &RunIndex<'_>,
        dag: &Dag,
        session_id: &str,
        memory: &mut SessionMemory,
        records: &mut HashMap<String, AgentExecutionRecord>,
        config: &OrchestratorConfig,
        cancel: CancellationToken,
    ) -> bool {
        let mut completed: HashSet<String> = HashSet::new();
        let all_ids: Vec<String> = index.agent_by_id.keys().map(|s| s.to_string()).collect();
        let mut cancelled_any = false;

        loop {
            if completed.len() == all_ids.len() {
                break;
            }
            if cancel.is_cancelled() {
                cancelled_any = true;
                break;
            }

            let mut ready: Vec<&str> = all_ids
                .iter()
                .map(String::as_str)
                .filter(|id| !completed.contains(*id) && dag.dependencies_of(*id).is_subset(&completed))
                .collect();

            if ready.is_empty() {
                self.tracer
                    .log_error(session_id, "no ready agents but work remains: dependency cycle", "dependency_cycle")
                    .await;
                break;
            }

            ready.sort_by(|a, b| {
                let oa = index.assignment_by_agent.get(*a).and_then(|asg| index.step_by_id.get(asg.step_id.as_str())).map(|s| s.execution_order).unwrap_or(usize::MAX);
                let ob = index.assignment_by_agent.get(*b).and_then(|asg| index.step_by_id.get(asg.step_id.as_str())).map(|s| s.execution_order).unwrap_or(usize::MAX);
                oa.cmp(&ob).then_with(|| a.cmp(b))
            });

            for agent_id in ready {
                if cancel.is_cancelled() {
                    cancelled_any = true;
                    break;
                }
                let Some(agent) = index.agent_by_id.get(agent_id) else { continue };
                let Some(assignment) = index.assignment_by_agent.get(agent_id) else { continue };
                let step = index.step_by_id.get(assignment.step_id.as_str()).copied();

                let input = self.prepare_input(plan, step, assignment, agent, index, memory, records, config, session_id).await;

                let record = self.execute_one(session_id, agent, assignment, &input, 1, memory, config, cancel.clone()).await;
                if record.status == ExecutionStatus::Cancelled {
                    cancelled_any = true;
                }
                completed.insert(agent_id.to_string());
                records.insert(agent_id.to_string(), record);
            }
        }

        cancelled_any
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_parallel(
        &self,
        plan: &Plan,
        selected: &[AgentDescriptor],
        index: &RunIndex<'_>,
        session_id: &str,
        memory: &mut SessionMemory,
        records: &mut HashMap<String, AgentExecutionRecord>,
        config: &OrchestratorConfig,
        cancel: CancellationToken,
    ) -> bool {
        let local_semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        let mut handles = Vec::new();

        for agent in selected {
            let Some(assignment) = index.assignment_by_agent.get(agent.agent_id.as_str()) else {
                continue;
            };
            let agent = agent.clone();
            let assignment = (*assignment).clone();
            let query = plan.query.clone();
            let invoker = self.invoker.clone();
            let tracer = self.tracer.clone();
            let session_id = session_id.to_string();
            let global = self.global_semaphore.clone();
            let local = local_semaphore.clone();
            let cancel = cancel.clone();
            let timeout = config.agent_execution_timeout;

            handles.push(tokio::spawn(async move {
                let _global_permit = global.acquire_owned().await.ok();
                let _local_permit = local.acquire_owned().await.ok();
                let handoff_id = tracer.start_handoff(&session_id, "orchestrator", &agent.agent_id, &agent.name, 0, String::new(), query.clone()).await;
                let attempt = invoke_with_retry(invoker.as_ref(), &agent.agent_id, &query, timeout, cancel).await;
                tracer
                    .complete_handoff(
                        &session_id,
                        &handoff_id,
                        Some(attempt.raw_output.clone()),
                        attempt.tools_used.clone(),
                        attempt.error.clone(),
                        attempt.status == ExecutionStatus::Timeout,
                    )
                    .await;
                (agent.agent_id.clone(), assignment.agent_name.clone(), attempt)
            }));
        }

        let mut outcomes = Vec::new();
        for handle in handles {
            if let Ok(outcome) = handle.await {
                outcomes.push(outcome);
            }
        }
        outcomes.sort_by(|a, b| a.0.cmp(&b.0));

        let mut cancelled_any = false;
        for (agent_id, agent_name, attempt) in outcomes {
            if attempt.status == ExecutionStatus::Cancelled {
                cancelled_any = true;
            }
            memory.record(&agent_name, &attempt.raw_output, attempt.status, attempt.tools_used.clone());
            let cleaned = memory.cleaned(&agent_name).unwrap_or("").to_string();
            records.insert(agent_id.clone(), finalize_record(&agent_id, cleaned, attempt));
        }

        cancelled_any
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_hybrid(
        &self,
        plan: &Plan,
        selected: &[AgentDescriptor],
        index: &RunIndex<'_>,
        dag: &Dag,
        session_id: &str,
        memory: &mut SessionMemory,
        records: &mut HashMap<String, AgentExecutionRecord>,
        config: &OrchestratorConfig,
        cancel: CancellationToken,
    ) -> bool {
        let local_semaphore = Arc::new(Semaphore::new(config.max_concurrency));
        let mut completed: HashSet<String> = HashSet::new();
        let all_ids: Vec<String> = selected.iter().map(|a| a.agent_id.clone()).collect();
        let mut cancelled_any = false;

        loop {
            if completed.len() == all_ids.len() {
                break;
            }
            if cancel.is_cancelled() {
                cancelled_any = true;
                break;
            }

            let wave: Vec<String> = all_ids
                .iter()
                .filter(|id| !completed.contains(*id) && dag.dependencies_of(id.as_str()).is_subset(&completed))
                .cloned()
                .collect();

            if wave.is_empty() {
                self.tracer
                    .log_error(session_id, "no ready wave but work remains: dependency cycle", "dependency_cycle")
                    .await;
                break;
            }

            let mut handles = Vec::new();
            for agent_id in &wave {
                let Some(agent) = index.agent_by_id.get(agent_id.as_str()) else { continue };
                let Some(assignment) = index.assignment_by_agent.get(agent_id.as_str()) else { continue };
                let step = index.step_by_id.get(assignment.step_id.as_str()).copied();

                let input = self.prepare_input(plan, step, assignment, agent, index, memory, records, config, session_id).await;

                let agent = (*agent).clone();
                let assignment = (*assignment).clone();
                let invoker = self.invoker.clone();
                let tracer = self.tracer.clone();
                let sid = session_id.to_string();
                let global = self.global_semaphore.clone();
                let local = local_semaphore.clone();
                let c = cancel.clone();
                let timeout = config.agent_execution_timeout;

                handles.push(tokio::spawn(async move {
                    let _global_permit = global.acquire_owned().await.ok();
                    let _local_permit = local.acquire_owned().await.ok();
                    let handoff_id = tracer.start_handoff(&sid, "orchestrator", &agent.agent_id, &agent.name, 0, input.clone(), input.clone()).await;
                    let attempt = invoke_with_retry(invoker.as_ref(), &agent.agent_id, &input, timeout, c).await;
                    tracer
                        .complete_handoff(
                            &sid,
                            &handoff_id,
                            Some(attempt.raw_output.clone()),
                            attempt.tools_used.clone(),
                            attempt.error.clone(),
                            attempt.status == ExecutionStatus::Timeout,
                        )
                        .await;
                    (agent.agent_id.clone(), assignment.agent_name.clone(), attempt)
                }));
            }

            let mut outcomes = Vec::new();
            for handle in handles {
                if let Ok(outcome) = handle.await {
                    outcomes.push(outcome);
                }
            }
            outcomes.sort_by(|a, b| a.0.cmp(&b.0));

            for (agent_id, agent_name, attempt) in outcomes {
                if attempt.status == ExecutionStatus::Cancelled {
                    cancelled_any = true;
                }
                memory.record(&agent_name, &attempt.raw_output, attempt.status, attempt.tools_used.clone());
                let cleaned = memory.cleaned(&agent_name).unwrap_or("").to_string();
                records.insert(agent_id.clone(), finalize_record(&agent_id, cleaned, attempt));
                completed.insert(agent_id);
            }
        }

        let _ = dag;
        cancelled_any
    }

    /// Build the worker input for `assignment` per §4.7: the verbatim query
    /// for a first step, or a context-augmented prompt referencing cleaned
    /// (and, when available, refined) upstream outputs for later steps.
    #[allow(clippy::too_many_arguments)]
    async fn prepare_input(
        &self,
        plan: &Plan,
        step: Option<&WorkflowStep>,
        assignment: &TaskAssignment,
        agent: &AgentDescriptor,
        index: &RunIndex<'_>,
        memory: &SessionMemory,
        records: &HashMap<String, AgentExecutionRecord>,
        config: &OrchestratorConfig,
        session_id: &str,
    ) -> String {
        let is_first_step = step.map(|s| s.execution_order == 1).unwrap_or(true);
        if is_first_step {
            return plan.query.clone();
        }

        let base = step.map(|s| s.description.clone()).unwrap_or_else(|| plan.query.clone());
        let mut sections = Vec::new();

        for dep_step_id in &assignment.dependencies {
            let Some(dep_assignment) = index.assignment_by_step.get(dep_step_id.as_str()) else {
                continue;
            };
            let dep_agent_name = dep_assignment.agent_name.clone();
            let dep_status = records.get(dep_assignment.agent_id.as_str()).map(|r| r.status);

            match dep_status {
                Some(ExecutionStatus::Completed) => {
                    let cleaned = memory.cleaned(&dep_agent_name).unwrap_or("").to_string();
                    let context_text = if !cleaned.is_empty() {
                        let (refined, metadata) = self
                            .refinement
                            .refine(
                                &cleaned,
                                "sequential_handoff",
                                &dep_agent_name,
                                &agent.name,
                                &base,
                                agent.max_context_length,
                                self.llm.as_ref(),
                                config,
                            )
                            .await;
                        self.tracer
                            .log_context_transfer(session_id, &dep_agent_name, &agent.name, refined.len(), metadata.strategy.as_str())
                            .await;
                        refined
                    } else {
                        cleaned
                    };
                    let truncated: String = context_text.chars().take(CONTEXT_TRUNCATE_LEN).collect();
                    sections.push(format!("Previous Agent ({}) Output:\n{}", dep_agent_name, truncated));
                }
                Some(_) | None => {
                    sections.push(format!("Previous Agent ({}) Output:\n[upstream {} failed]", dep_agent_name, dep_agent_name));
                }
            }
        }

        if sections.is_empty() {
            return base;
        }

        format!(
            "{}\n\nCONTEXT FROM PREVIOUS AGENTS:\n{}\n\nINSTRUCTIONS:\n- Build upon the previous output; do not repeat it.\n- Your task is distinct; focus on your assignment.\n- Do not duplicate information already present upstream.",
            base,
            sections.join("\n\n")
        )
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_one(
        &self,
        session_id: &str,
        agent: &AgentDescriptor,
        assignment: &TaskAssignment,
        input: &str,
        handoff_number: usize,
        memory: &mut SessionMemory,
        config: &OrchestratorConfig,
        cancel: CancellationToken,
    ) -> AgentExecutionRecord {
        let _global_permit = self.global_semaphore.acquire().await.ok();

        let handoff_id = self
            .tracer
            .start_handoff(session_id, "orchestrator", &agent.agent_id, &agent.name, handoff_number, input.to_string(), input.to_string())
            .await;

        let attempt = invoke_with_retry(self.invoker.as_ref(), &agent.agent_id, input, config.agent_execution_timeout, cancel).await;

        self.tracer
            .complete_handoff(
                session_id,
                &handoff_id,
                Some(attempt.raw_output.clone()),
                attempt.tools_used.clone(),
                attempt.error.clone(),
                attempt.status == ExecutionStatus::Timeout,
            )
            .await;

        memory.record(&assignment.agent_name, &attempt.raw_output, attempt.status, attempt.tools_used.clone());
        let cleaned = memory.cleaned(&assignment.agent_name).unwrap_or("").to_string();
        finalize_record(&agent.agent_id, cleaned, attempt)
    }
}

fn finalize_record(agent_id: &str, cleaned_output: String, attempt: AttemptResult) -> AgentExecutionRecord {
    let now = chrono::Utc::now();
    AgentExecutionRecord {
        agent_id: agent_id.to_string(),
        raw_output: attempt.raw_output,
        cleaned_output,
        start_time: now,
        end_time: Some(now),
        execution_time_ms: Some(0),
        status: attempt.status,
        error: attempt.error,
        quality_score: if attempt.status == ExecutionStatus::Completed { 0.8 } else { 0.0 },
        tools_used: attempt.tools_used,
    }
}

async fn invoke_with_retry(
    invoker: &dyn AgentInvoker,
    agent_id: &str,
    prompt: &str,
    timeout: Duration,
    cancel: CancellationToken,
) -> AttemptResult {
    for attempt in 0..MAX_ATTEMPTS {
        if cancel.is_cancelled() {
            return AttemptResult {
                raw_output: String::new(),
                tools_used: Vec::new(),
                status: ExecutionStatus::Cancelled,
                error: Some("session cancelled".to_string()),
            };
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => None,
            res = tokio::time::timeout(timeout, invoker.invoke(agent_id, prompt, cancel.clone())) => Some(res),
        };

        match result {
            None => {
                return AttemptResult {
                    raw_output: String::new(),
                    tools_used: Vec::new(),
                    status: ExecutionStatus::Cancelled,
                    error: Some("session cancelled".to_string()),
                };
            }
            Some(Err(_elapsed)) => {
                return AttemptResult {
                    raw_output: String::new(),
                    tools_used: Vec::new(),
                    status: ExecutionStatus::Timeout,
                    error: Some(format!("agent {} exceeded execution timeout", agent_id)),
                };
            }
            Some(Ok(Ok(outcome))) => {
                return AttemptResult {
                    raw_output: outcome.raw_output,
                    tools_used: outcome.tools_used,
                    status: ExecutionStatus::Completed,
                    error: None,
                };
            }
            Some(Ok(Err(WorkerError::Transport(msg)))) => {
                if (attempt as usize) < RETRY_BACKOFF.len() {
                    tokio::time::sleep(RETRY_BACKOFF[attempt as usize]).await;
                    continue;
                }
                return AttemptResult {
                    raw_output: String::new(),
                    tools_used: Vec::new(),
                    status: ExecutionStatus::Failed,
                    error: Some(msg),
                };
            }
            Some(Ok(Err(WorkerError::AgentFailure(msg)))) => {
                return AttemptResult {
                    raw_output: String::new(),
                    tools_used: Vec::new(),
                    status: ExecutionStatus::Failed,
                    error: Some(msg),
                };
            }
            Some(Ok(Err(WorkerError::Cancelled))) => {
                return AttemptResult {
                    raw_output: String::new(),
                    tools_used: Vec::new(),
                    status: ExecutionStatus::Cancelled,
                    error: Some("invocation cancelled".to_string()),
                };
            }
        }
    }

    AttemptResult {
        raw_output: String::new(),
        tools_used: Vec::new(),
        status: ExecutionStatus::Failed,
        error: Some("exhausted retries".to_string()),
    }
}

/// Determine the dispatch strategy for a run, per §4.4. Returns the chosen
/// strategy and whether it was downgraded from an explicit `parallel`
/// request because the DAG has edges. Pure and side-effect free so the
/// orchestrator can call it ahead of `ExecutionScheduler::run` to start the
/// trace with a meaningful strategy name.
pub(crate) fn determine_strategy(plan: &Plan, dag: &Dag, selected_count: usize) -> (Strategy, bool) {
    if matches!(plan.orchestration_strategy, Strategy::Sequential | Strategy::Parallel | Strategy::Hybrid) {
        if plan.orchestration_strategy == Strategy::Parallel && dag.has_edges() {
            return (Strategy::Hybrid, true);
        }
        return (plan.orchestration_strategy, false);
    }

    if plan.workflow_pattern == WorkflowPattern::SingleAgent {
        return (Strategy::Single, false);
    }

    if !dag.has_edges() && selected_count > 1 {
        (Strategy::Parallel, false)
    } else {
        (Strategy::Sequential, false)
    }
}

pub(crate) fn strategy_name(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Single => "single",
        Strategy::Sequential => "sequential",
        Strategy::Parallel => "parallel",
        Strategy::Hybrid => "hybrid",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_store::AgentDescriptorStore;
    use crate::types::{Complexity, Priority, WorkflowPattern};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct EchoInvoker;

    #[async_trait]
    impl AgentInvoker for EchoInvoker {
        async fn invoke(&self, agent_id: &str, prompt: &str, _cancel: CancellationToken) -> Result<crate::worker::WorkerOutcome, WorkerError> {
            Ok(crate::worker::WorkerOutcome {
                raw_output: format!("{} says: {}", agent_id, prompt),
                tools_used: Vec::new(),
            })
        }
    }

    struct FlakyInvoker {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl AgentInvoker for FlakyInvoker {
        async fn invoke(&self, _agent_id: &str, _prompt: &str, _cancel: CancellationToken) -> Result<crate::worker::WorkerOutcome, WorkerError> {
            let n = self.attempts.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(WorkerError::Transport("temporary glitch".to_string()))
            } else {
                Ok(crate::worker::WorkerOutcome {
                    raw_output: "recovered".to_string(),
                    tools_used: Vec::new(),
                })
            }
        }
    }

    struct FailingReasoningLlm;

    #[async_trait]
    impl ReasoningLlm for FailingReasoningLlm {
        async fn complete(&self, _prompt: &str, _opts: crate::llm::CompletionOptions) -> Result<String, crate::error::ReasoningError> {
            Err(crate::error::ReasoningError("no reasoning llm in test".to_string()))
        }
    }

    fn single_agent_plan(query: &str) -> Plan {
        Plan {
            query: query.to_string(),
            intent: "respond".to_string(),
            domain: "creative".to_string(),
            complexity: Complexity::Simple,
            workflow_pattern: WorkflowPattern::SingleAgent,
            orchestration_strategy: Strategy::Single,
            steps: vec![WorkflowStep {
                step_id: "step-1".to_string(),
                description: query.to_string(),
                required_capability: "creative".to_string(),
                execution_order: 1,
                dependencies: Vec::new(),
            }],
            success_criteria: "done".to_string(),
            reasoning: "r".to_string(),
        }
    }

    #[tokio::test]
    async fn single_strategy_invokes_one_agent_with_verbatim_query() {
        let scheduler = ExecutionScheduler::new(
            Arc::new(EchoInvoker),
            Arc::new(FailingReasoningLlm),
            Arc::new(Tracer::new()),
            Arc::new(ContextRefinementEngine::new()),
            &OrchestratorConfig::default(),
        );
        let plan = single_agent_plan("Write me a short poem about rain.");
        let agent = AgentDescriptor::new("a1", "CreativeAssistant", "model");
        let assignment = TaskAssignment {
            step_id: "step-1".to_string(),
            agent_id: "a1".to_string(),
            agent_name: "CreativeAssistant".to_string(),
            relevance_score: 0.9,
            input_context_hint: String::new(),
            output_context_hint: String::new(),
            priority: Priority::High,
            dependencies: Vec::new(),
        };
        let dag = Dag::default();
        let store = AgentDescriptorStore::new();
        store.register(agent.clone()).await;
        let selected = store.list().await;

        let result = scheduler
            .run(&plan, &selected, &[assignment], &dag, "s1", &OrchestratorConfig::default(), CancellationToken::new())
            .await;

        assert_eq!(result.final_strategy, Strategy::Single);
        assert_eq!(result.records.len(), 1);
        let record = result.records.get("a1").unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert!(record.cleaned_output.contains("Write me a short poem about rain."));
    }

    #[tokio::test]
    async fn retries_transport_errors_and_recovers() {
        let scheduler = ExecutionScheduler::new(
            Arc::new(FlakyInvoker { attempts: AtomicUsize::new(0) }),
            Arc::new(FailingReasoningLlm),
            Arc::new(Tracer::new()),
            Arc::new(ContextRefinementEngine::new()),
            &OrchestratorConfig::default(),
        );
        let plan = single_agent_plan("Analyze this.");
        let assignment = TaskAssignment {
            step_id: "step-1".to_string(),
            agent_id: "a1".to_string(),
            agent_name: "Agent".to_string(),
            relevance_score: 0.9,
            input_context_hint: String::new(),
            output_context_hint: String::new(),
            priority: Priority::High,
            dependencies: Vec::new(),
        };
        let agent = AgentDescriptor::new("a1", "Agent", "model");
        let dag = Dag::default();

        let result = scheduler
            .run(&plan, &[agent], &[assignment], &dag, "s1", &OrchestratorConfig::default(), CancellationToken::new())
            .await;

        let record = result.records.get("a1").unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.cleaned_output, "recovered");
    }
}
