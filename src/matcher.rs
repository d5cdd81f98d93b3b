//! `C6` — the Agent Matcher/Scorer.
//!
//! `Select(plan, agents) -> (selectedAgents, taskDecomposition, scoreTable)`.
//! Scoring follows the formula in §4.2; selection is a greedy per-step
//! assignment with a no-fan-in rule (each agent bound to at most one step
//! per session, unless the agent pool is a singleton). Grounded in the
//! original source's much simpler substring matcher
//! (`_select_agents_by_relevance` in `enhanced_a2a_orchestrator.py`), which
//! this generalizes into an explicit, clamped scoring function.

use std::collections::HashMap;

use crate::config::OrchestratorConfig;
use crate::types::{AgentDescriptor, Plan, Priority, Strategy, TaskAssignment, WorkflowPattern, WorkflowStep};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leaning {
    Technical,
    Creative,
    Analytical,
    Other,
}

fn leaning(text: &str, config: &OrchestratorConfig) -> Leaning {
    let lower = text.to_ascii_lowercase();
    let is = |set: &[String]| set.iter().any(|k| lower.contains(k.as_str()));
    if is(&config.creative_keywords) {
        Leaning::Creative
    } else if is(&config.technical_keywords) {
        Leaning::Technical
    } else if is(&config.analytical_keywords) {
        Leaning::Analytical
    } else {
        Leaning::Other
    }
}

fn canonical_token(capability: &str) -> String {
    capability.split(['_', '-']).next().unwrap_or(capability).to_ascii_lowercase()
}

/// Compute the `(agent, step)` score defined in §4.2, clamped to `[0, 1]`.
pub fn score(agent: &AgentDescriptor, step: &WorkflowStep, config: &OrchestratorConfig) -> f32 {
    let step_text = format!("{} {}", step.description, step.required_capability).to_ascii_lowercase();
    let mut s: f32 = 0.5;

    let token = canonical_token(&step.required_capability);
    if !token.is_empty()
        && (agent.name.to_ascii_lowercase().contains(&token) || agent.domain.to_ascii_lowercase().contains(&token))
    {
        s += 0.95;
    }

    for cap in &agent.capabilities {
        let cap_token = canonical_token(cap);
        if !cap_token.is_empty() && step_text.contains(&cap_token) {
            s += 0.4;
        }
    }

    let k = agent
        .keywords
        .iter()
        .filter(|kw| step_text.contains(&kw.to_ascii_lowercase()))
        .count();
    s += 0.2 * k as f32;

    if !agent.domain.is_empty() && step_text.contains(&agent.domain.to_ascii_lowercase()) {
        s += 0.3;
    }

    if !agent.specialization.is_empty() && step_text.contains(&agent.specialization.to_ascii_lowercase()) {
        s += 0.4;
    }

    let step_lean = leaning(&step_text, config);
    let agent_lean = leaning(&format!("{} {}", agent.domain, agent.specialization), config);

    match (step_lean, agent_lean) {
        (Leaning::Analytical, Leaning::Creative) => s *= 0.7,
        (Leaning::Creative, Leaning::Analytical)
        | (Leaning::Technical, Leaning::Creative)
        | (Leaning::Creative, Leaning::Technical) => s *= 0.8,
        (a, b) if a == b && a != Leaning::Other => s *= 1.2,
        _ => {}
    }

    s.clamp(0.0, 1.0)
}

/// Full `(step, agent) -> score` table.
pub type ScoreTable = HashMap<(String, String), f32>;

fn build_score_table(steps: &[WorkflowStep], agents: &[AgentDescriptor], config: &OrchestratorConfig) -> ScoreTable {
    let mut table = ScoreTable::new();
    for step in steps {
        for agent in agents {
            table.insert((step.step_id.clone(), agent.agent_id.clone()), score(agent, step, config));
        }
    }
    table
}

fn priority_for(order: usize, total: usize) -> Priority {
    if order == 1 {
        Priority::High
    } else if order == total {
        Priority::Low
    } else {
        Priority::Medium
    }
}

/// Select agents for `plan` and build the task decomposition. Returns the
/// selected agents (in assignment order), the per-step task assignments, and
/// the full score table.
pub fn select(
    plan: &Plan,
    agents: &[AgentDescriptor],
    config: &OrchestratorConfig,
) -> (Vec<AgentDescriptor>, Vec<TaskAssignment>, ScoreTable) {
    let table = build_score_table(&plan.steps, agents, config);

    if plan.workflow_pattern == WorkflowPattern::SingleAgent && plan.orchestration_strategy == Strategy::Single {
        return select_single(plan, agents, table, config);
    }

    select_multi(plan, agents, table, config)
}

fn select_single(
    plan: &Plan,
    agents: &[AgentDescriptor],
    table: ScoreTable,
    _config: &OrchestratorConfig,
) -> (Vec<AgentDescriptor>, Vec<TaskAssignment>, ScoreTable) {
    let step = match plan.steps.first() {
        Some(s) => s,
        None => return (Vec::new(), Vec::new(), table),
    };

    let best = agents
        .iter()
        .map(|a| (a, *table.get(&(step.step_id.clone(), a.agent_id.clone())).unwrap_or(&0.0)))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    match best {
        Some((agent, s)) => {
            let assignment = TaskAssignment {
                step_id: step.step_id.clone(),
                agent_id: agent.agent_id.clone(),
                agent_name: agent.name.clone(),
                relevance_score: s,
                input_context_hint: step.description.clone(),
                output_context_hint: String::new(),
                priority: Priority::High,
                dependencies: Vec::new(),
            };
            (vec![agent.clone()], vec![assignment], table)
        }
        None => (Vec::new(), Vec::new(), table),
    }
}

fn select_multi(
    plan: &Plan,
    agents: &[AgentDescriptor],
    table: ScoreTable,
    config: &OrchestratorConfig,
) -> (Vec<AgentDescriptor>, Vec<TaskAssignment>, ScoreTable) {
    let mut ordered_steps = plan.steps.clone();
    ordered_steps.sort_by(|a, b| a.execution_order.cmp(&b.execution_order).then(a.step_id.cmp(&b.step_id)));

    let singleton_pool = agents.len() == 1;
    let mut used: Vec<String> = Vec::new();
    let mut selected: Vec<AgentDescriptor> = Vec::new();
    let mut assignments: Vec<TaskAssignment> = Vec::new();
    let total = ordered_steps.len();

    for step in &ordered_steps {
        let candidates: Vec<&AgentDescriptor> = if singleton_pool {
            agents.iter().collect()
        } else {
            agents.iter().filter(|a| !used.contains(&a.agent_id)).collect()
        };

        let pick_from = |pool: &[&AgentDescriptor]| -> Option<(AgentDescriptor, f32)> {
            pool.iter()
                .map(|a| (*a, *table.get(&(step.step_id.clone(), a.agent_id.clone())).unwrap_or(&0.0)))
                .max_by(|a, b| {
                    a.1.partial_cmp(&b.1)
                        .unwrap()
                        .then_with(|| a.0.name.cmp(&b.0.name))
                })
                .map(|(a, s)| (a.clone(), s))
        };

        let mut above_threshold: Vec<&AgentDescriptor> = candidates
            .iter()
            .filter(|a| *table.get(&(step.step_id.clone(), a.agent_id.clone())).unwrap_or(&0.0) >= config.min_agent_score_threshold)
            .copied()
            .collect();

        let chosen = if !above_threshold.is_empty() {
            pick_from(&above_threshold)
        } else if !candidates.is_empty() {
            pick_from(&candidates)
        } else {
            // All agents already used and pool is not a singleton: fall back
            // to the globally highest scoring agent regardless of prior use.
            above_threshold = agents.iter().collect();
            pick_from(&above_threshold)
        };

        if let Some((agent, s)) = chosen {
            if !used.contains(&agent.agent_id) {
                used.push(agent.agent_id.clone());
            }
            if !selected.iter().any(|a: &AgentDescriptor| a.agent_id == agent.agent_id) {
                selected.push(agent.clone());
            }

            let dependencies: Vec<String> = if !step.dependencies.is_empty() {
                step.dependencies.clone()
            } else if step.execution_order > 1 {
                ordered_steps
                    .iter()
                    .filter(|s| s.execution_order < step.execution_order)
                    .max_by_key(|s| s.execution_order)
                    .map(|s| vec![s.step_id.clone()])
                    .unwrap_or_default()
            } else {
                Vec::new()
            };

            assignments.push(TaskAssignment {
                step_id: step.step_id.clone(),
                agent_id: agent.agent_id.clone(),
                agent_name: agent.name.clone(),
                relevance_score: s,
                input_context_hint: step.description.clone(),
                output_context_hint: String::new(),
                priority: priority_for(step.execution_order, total),
                dependencies,
            });
        }
    }

    (selected, assignments, table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complexity;

    fn agent(id: &str, name: &str, caps: &[&str], domain: &str) -> AgentDescriptor {
        AgentDescriptor::new(id, name, "model")
            .with_capabilities(caps.iter().map(|c| c.to_string()))
            .with_domain(domain)
    }

    fn base_plan(steps: Vec<WorkflowStep>, pattern: WorkflowPattern, strategy: Strategy) -> Plan {
        Plan {
            query: "q".to_string(),
            intent: "i".to_string(),
            domain: "d".to_string(),
            complexity: Complexity::Simple,
            workflow_pattern: pattern,
            orchestration_strategy: strategy,
            steps,
            success_criteria: "done".to_string(),
            reasoning: "r".to_string(),
        }
    }

    #[test]
    fn scores_are_clamped_to_unit_interval() {
        let config = OrchestratorConfig::default();
        let a = agent("a1", "WeatherAgent", &["weather"], "weather");
        let step = WorkflowStep {
            step_id: "step-1".to_string(),
            description: "weather weather weather weather".to_string(),
            required_capability: "weather".to_string(),
            execution_order: 1,
            dependencies: Vec::new(),
        };
        let s = score(&a, &step, &config);
        assert!((0.0..=1.0).contains(&s));
    }

    #[test]
    fn single_agent_plan_selects_highest_scorer() {
        let config = OrchestratorConfig::default();
        let creative = agent("c1", "CreativeAssistant", &["creative", "poetry"], "creative");
        let weather = agent("w1", "WeatherAgent", &["weather"], "weather");
        let step = WorkflowStep {
            step_id: "step-1".to_string(),
            description: "Write me a short poem about rain.".to_string(),
            required_capability: "creative".to_string(),
            execution_order: 1,
            dependencies: Vec::new(),
        };
        let plan = base_plan(vec![step], WorkflowPattern::SingleAgent, Strategy::Single);
        let (selected, assignments, _) = select(&plan, &[creative.clone(), weather], &config);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].agent_id, "c1");
        assert_eq!(assignments[0].agent_id, "c1");
    }

    #[test]
    fn multi_agent_plan_does_not_fan_in_with_multiple_agents_available() {
        let config = OrchestratorConfig::default();
        let telco = agent("t1", "TelcoRANAgent", &["ran", "technical"], "technical");
        let creative = agent("c1", "CreativeAssistant", &["creative"], "creative");
        let steps = vec![
            WorkflowStep {
                step_id: "step-1".to_string(),
                description: "Explain 4G PRB utilization".to_string(),
                required_capability: "ran".to_string(),
                execution_order: 1,
                dependencies: Vec::new(),
            },
            WorkflowStep {
                step_id: "step-2".to_string(),
                description: "write a short humorous poem about it".to_string(),
                required_capability: "creative".to_string(),
                execution_order: 2,
                dependencies: vec!["step-1".to_string()],
            },
        ];
        let plan = base_plan(steps, WorkflowPattern::MultiAgent, Strategy::Sequential);
        let (selected, assignments, _) = select(&plan, &[telco, creative], &config);
        assert_eq!(selected.len(), 2);
        assert_eq!(assignments.len(), 2);
        assert_ne!(assignments[0].agent_id, assignments[1].agent_id);
    }

    #[test]
    fn singleton_pool_takes_every_step() {
        let config = OrchestratorConfig::default();
        let only = agent("o1", "GeneralAgent", &["general"], "general");
        let steps = vec![
            WorkflowStep {
                step_id: "step-1".to_string(),
                description: "first".to_string(),
                required_capability: "general".to_string(),
                execution_order: 1,
                dependencies: Vec::new(),
            },
            WorkflowStep {
                step_id: "step-2".to_string(),
                description: "second".to_string(),
                required_capability: "general".to_string(),
                execution_order: 2,
                dependencies: Vec::new(),
            },
        ];
        let plan = base_plan(steps, WorkflowPattern::MultiAgent, Strategy::Sequential);
        let (selected, assignments, _) = select(&plan, &[only], &config);
        assert_eq!(selected.len(), 1);
        assert_eq!(assignments.len(), 2);
        assert_eq!(assignments[0].agent_id, "o1");
        assert_eq!(assignments[1].agent_id, "o1");
    }
}
