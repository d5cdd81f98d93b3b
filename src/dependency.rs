//! `C7` — the Dependency Graph Builder.
//!
//! `Build(selected, plan, capabilityDependencies) -> DAG`. Edges come from
//! two sources — a config-driven capability-dependency table and explicit
//! step dependencies — combined, de-duplicated, and checked for cycles. A
//! detected cycle is repaired by breaking the lowest-combined-score edge
//! (scores come from the matcher's score table) and reported to the tracer
//! as `dependency_cycle`.

use std::collections::{HashMap, HashSet};

use crate::matcher::ScoreTable;
use crate::types::{AgentDescriptor, Plan, TaskAssignment};

/// A directed acyclic graph over selected agent ids: `edges[to]` holds the
/// set of agent ids `to` depends on (must complete first).
#[derive(Debug, Clone, Default)]
pub struct Dag {
    nodes: Vec<String>,
    edges: HashMap<String, HashSet<String>>,
}

impl Dag {
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Agent ids that `agent_id` depends on.
    pub fn dependencies_of(&self, agent_id: &str) -> HashSet<String> {
        self.edges.get(agent_id).cloned().unwrap_or_default()
    }

    pub fn has_edges(&self) -> bool {
        self.edges.values().any(|deps| !deps.is_empty())
    }

    fn add_edge(&mut self, from: &str, to: &str) {
        if from == to {
            return;
        }
        self.edges.entry(to.to_string()).or_default().insert(from.to_string());
    }

    fn all_edges(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for (to, froms) in &self.edges {
            for from in froms {
                out.push((from.clone(), to.clone()));
            }
        }
        out
    }

    fn remove_edge(&mut self, from: &str, to: &str) {
        if let Some(set) = self.edges.get_mut(to) {
            set.remove(from);
        }
    }

    fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unvisited,
            Visiting,
            Done,
        }

        let mut mark: HashMap<&str, Mark> = self.nodes.iter().map(|n| (n.as_str(), Mark::Unvisited)).collect();
        let mut stack: Vec<String> = Vec::new();

        fn visit(
            node: &str,
            edges: &HashMap<String, HashSet<String>>,
            mark: &mut HashMap<&str, Mark>,
            stack: &mut Vec<String>,
        ) -> Option<Vec<String>> {
            mark.insert(node, Mark::Visiting);
            stack.push(node.to_string());
            if let Some(deps) = edges.get(node) {
                for dep in deps {
                    match mark.get(dep.as_str()).copied().unwrap_or(Mark::Unvisited) {
                        Mark::Visiting => {
                            let start = stack.iter().position(|n| n == dep).unwrap_or(0);
                            return Some(stack[start..].to_vec());
                        }
                        Mark::Unvisited => {
                            if let Some(cycle) = visit(dep, edges, mark, stack) {
                                return Some(cycle);
                            }
                        }
                        Mark::Done => {}
                    }
                }
            }
            stack.pop();
            mark.insert(node, Mark::Done);
            None
        }

        for node in &self.nodes {
            if mark.get(node.as_str()).copied() == Some(Mark::Unvisited) {
                if let Some(cycle) = visit(node, &self.edges, &mut mark, &mut stack) {
                    return Some(cycle);
                }
            }
        }
        None
    }
}

/// Outcome of a `build` call: the DAG plus an optional cycle-repair note for
/// the caller to log as an `error_occurred` / `dependency_cycle` event.
pub struct BuildResult {
    pub dag: Dag,
    pub cycle_broken: Option<(String, String)>,
}

/// Build the dependency DAG for `selected` agents from the plan's explicit
/// step dependencies and `capability_dependencies`, repairing any cycle by
/// dropping the lowest-combined-score edge.
pub fn build(
    selected: &[AgentDescriptor],
    assignments: &[TaskAssignment],
    plan: &Plan,
    capability_dependencies: &HashMap<String, Vec<String>>,
    scores: &ScoreTable,
) -> BuildResult {
    let mut dag = Dag {
        nodes: selected.iter().map(|a| a.agent_id.clone()).collect(),
        edges: HashMap::new(),
    };

    let assignment_by_step: HashMap<&str, &TaskAssignment> =
        assignments.iter().map(|a| (a.step_id.as_str(), a)).collect();

    // 1. Capability dependency table: agent A holds capability C with
    //    dependencies D1..Dn; for any other selected agent B holding some Di,
    //    add edge B -> A.
    for a in selected {
        for capability in &a.capabilities {
            if let Some(required) = capability_dependencies.get(capability) {
                for b in selected {
                    if b.agent_id == a.agent_id {
                        continue;
                    }
                    if b.capabilities.iter().any(|c| required.contains(c)) {
                        dag.add_edge(&b.agent_id, &a.agent_id);
                    }
                }
            }
        }
    }

    // 2. Explicit step dependencies: step X depends on step Y, X bound to A,
    //    Y bound to B => edge B -> A.
    for step in &plan.steps {
        let Some(x_assignment) = assignment_by_step.get(step.step_id.as_str()) else {
            continue;
        };
        for dep_step_id in &step.dependencies {
            if let Some(y_assignment) = assignment_by_step.get(dep_step_id.as_str()) {
                dag.add_edge(&y_assignment.agent_id, &x_assignment.agent_id);
            }
        }
    }

    let mut cycle_broken = None;
    if let Some(cycle) = dag.find_cycle() {
        if let Some((from, to)) = weakest_edge(&cycle, scores, assignments) {
            dag.remove_edge(&from, &to);
            cycle_broken = Some((from, to));
        }
    }

    BuildResult { dag, cycle_broken }
}

/// Pick the edge along `cycle` with the lowest combined endpoint score
/// (summed over each endpoint's best score in the score table).
fn weakest_edge(cycle: &[String], scores: &ScoreTable, assignments: &[TaskAssignment]) -> Option<(String, String)> {
    if cycle.len() < 2 {
        return None;
    }

    let best_score_for = |agent_id: &str| -> f32 {
        assignments
            .iter()
            .find(|a| a.agent_id == agent_id)
            .map(|a| {
                scores
                    .get(&(a.step_id.clone(), a.agent_id.clone()))
                    .copied()
                    .unwrap_or(a.relevance_score)
            })
            .unwrap_or(0.5)
    };

    let mut edges: Vec<(String, String)> = Vec::new();
    for w in cycle.windows(2) {
        edges.push((w[0].clone(), w[1].clone()));
    }
    edges.push((cycle[cycle.len() - 1].clone(), cycle[0].clone()));

    edges.into_iter().min_by(|a, b| {
        let wa = best_score_for(&a.0) + best_score_for(&a.1);
        let wb = best_score_for(&b.0) + best_score_for(&b.1);
        wa.partial_cmp(&wb).unwrap()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn assignment(step: &str, agent: &str, deps: &[&str]) -> TaskAssignment {
        TaskAssignment {
            step_id: step.to_string(),
            agent_id: agent.to_string(),
            agent_name: agent.to_string(),
            relevance_score: 0.8,
            input_context_hint: String::new(),
            output_context_hint: String::new(),
            priority: Priority::Medium,
            dependencies: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn agent(id: &str, caps: &[&str]) -> AgentDescriptor {
        AgentDescriptor::new(id, id, "model").with_capabilities(caps.iter().map(|c| c.to_string()))
    }

    #[test]
    fn explicit_step_dependency_produces_edge() {
        let a = agent("a1", &["ran"]);
        let b = agent("b1", &["creative"]);
        let plan = Plan {
            query: "q".to_string(),
            intent: "i".to_string(),
            domain: "d".to_string(),
            complexity: crate::types::Complexity::Moderate,
            workflow_pattern: crate::types::WorkflowPattern::MultiAgent,
            orchestration_strategy: crate::types::Strategy::Sequential,
            steps: vec![
                crate::types::WorkflowStep {
                    step_id: "step-1".to_string(),
                    description: "first".to_string(),
                    required_capability: "ran".to_string(),
                    execution_order: 1,
                    dependencies: Vec::new(),
                },
                crate::types::WorkflowStep {
                    step_id: "step-2".to_string(),
                    description: "second".to_string(),
                    required_capability: "creative".to_string(),
                    execution_order: 2,
                    dependencies: vec!["step-1".to_string()],
                },
            ],
            success_criteria: "done".to_string(),
            reasoning: "r".to_string(),
        };
        let assignments = vec![assignment("step-1", "a1", &[]), assignment("step-2", "b1", &["step-1"])];
        let scores = ScoreTable::new();
        let result = build(&[a, b], &assignments, &plan, &HashMap::new(), &scores);
        assert!(result.dag.dependencies_of("b1").contains("a1"));
        assert!(result.cycle_broken.is_none());
    }

    #[test]
    fn cycle_is_detected_and_broken() {
        let a = agent("a1", &["needs_b"]);
        let b = agent("b1", &["needs_a"]);
        let mut capability_dependencies = HashMap::new();
        capability_dependencies.insert("needs_b".to_string(), vec!["needs_a".to_string()]);
        capability_dependencies.insert("needs_a".to_string(), vec!["needs_b".to_string()]);

        let plan = Plan {
            query: "q".to_string(),
            intent: "i".to_string(),
            domain: "d".to_string(),
            complexity: crate::types::Complexity::Moderate,
            workflow_pattern: crate::types::WorkflowPattern::MultiAgent,
            orchestration_strategy: crate::types::Strategy::Sequential,
            steps: Vec::new(),
            success_criteria: "done".to_string(),
            reasoning: "r".to_string(),
        };
        let assignments = vec![assignment("step-1", "a1", &[]), assignment("step-2", "b1", &[])];
        let scores = ScoreTable::new();
        let result = build(&[a, b], &assignments, &plan, &capability_dependencies, &scores);
        assert!(result.cycle_broken.is_some());
        assert!(result.dag.find_cycle().is_none());
    }
}
