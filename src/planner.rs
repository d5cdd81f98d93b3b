//! `C5` — the Query Planner.
//!
//! `Plan(query) -> Plan | PlanError`. The planner asks the reasoning LLM for a
//! structured decomposition, then deterministically validates and repairs the
//! response (§4.1). If the LLM is unreachable or returns unparseable text, a
//! heuristic keyword-classification fallback takes over — grounded in the
//! original Python source's simple substring-based agent/task classification,
//! generalized here into an explicit rule table.

use serde::Deserialize;
use serde_json::Value;

use crate::config::OrchestratorConfig;
use crate::error::PlanError;
use crate::llm::{extract_json, CompletionOptions, ReasoningLlm};
use crate::types::{Complexity, Plan, Strategy, WorkflowPattern, WorkflowStep};

#[derive(Deserialize)]
struct RawStep {
    #[serde(default)]
    description: String,
    #[serde(alias = "required_capability", default)]
    required_capability: String,
    #[serde(alias = "execution_order", default)]
    execution_order: Option<usize>,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Deserialize)]
struct RawPlan {
    #[serde(default)]
    intent: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    complexity: String,
    #[serde(alias = "workflow_pattern", default)]
    workflow_pattern: String,
    #[serde(alias = "orchestration_strategy", default)]
    orchestration_strategy: String,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(alias = "success_criteria", default)]
    success_criteria: String,
    #[serde(default)]
    reasoning: String,
}

fn parse_complexity(s: &str) -> Complexity {
    match s.to_ascii_lowercase().as_str() {
        "complex" => Complexity::Complex,
        "moderate" => Complexity::Moderate,
        _ => Complexity::Simple,
    }
}

fn parse_workflow_pattern(s: &str) -> WorkflowPattern {
    match s.to_ascii_lowercase().as_str() {
        "multi_agent" => WorkflowPattern::MultiAgent,
        "varying_domain" => WorkflowPattern::VaryingDomain,
        _ => WorkflowPattern::SingleAgent,
    }
}

fn parse_strategy(s: &str) -> Strategy {
    match s.to_ascii_lowercase().as_str() {
        "single_agent" | "single" => Strategy::Single,
        "parallel" => Strategy::Parallel,
        "hybrid" => Strategy::Hybrid,
        _ => Strategy::Sequential,
    }
}

fn build_step(idx: usize, raw: RawStep) -> WorkflowStep {
    WorkflowStep {
        step_id: format!("step-{}", idx + 1),
        description: raw.description,
        required_capability: if raw.required_capability.is_empty() {
            "general_assistance".to_string()
        } else {
            raw.required_capability
        },
        execution_order: raw.execution_order.unwrap_or(idx + 1),
        dependencies: raw.dependencies,
    }
}

fn plan_from_raw(query: &str, raw: RawPlan) -> Plan {
    let steps: Vec<WorkflowStep> = raw
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, s)| build_step(i, s))
        .collect();

    Plan {
        query: query.to_string(),
        intent: raw.intent,
        domain: raw.domain,
        complexity: parse_complexity(&raw.complexity),
        workflow_pattern: parse_workflow_pattern(&raw.workflow_pattern),
        orchestration_strategy: parse_strategy(&raw.orchestration_strategy),
        steps,
        success_criteria: raw.success_criteria,
        reasoning: raw.reasoning,
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let lower = haystack.to_ascii_lowercase();
    needles.iter().any(|n| lower.contains(n.as_str()))
}

fn first_connective<'a>(query: &str, markers: &'a [String]) -> Option<(&'a str, usize)> {
    let lower = query.to_ascii_lowercase();
    markers
        .iter()
        .filter_map(|m| lower.find(m.as_str()).map(|pos| (m.as_str(), pos)))
        .min_by_key(|(_, pos)| *pos)
}

/// Apply the deterministic repair rules from §4.1 to an LLM- or
/// heuristic-produced plan.
fn repair(mut plan: Plan, config: &OrchestratorConfig) -> Plan {
    let has_connective = first_connective(&plan.query, &config.multi_agent_keywords).is_some();
    let has_tech_and_creative = contains_any(&plan.query, &config.technical_keywords)
        && contains_any(&plan.query, &config.creative_keywords);

    if plan.workflow_pattern == WorkflowPattern::SingleAgent && (has_connective || has_tech_and_creative) {
        plan.workflow_pattern = WorkflowPattern::MultiAgent;

        if plan.steps.len() < 2 {
            if let Some((marker, pos)) = first_connective(&plan.query, &config.multi_agent_keywords) {
                let left = plan.query[..pos].trim().to_string();
                let right = plan.query[pos + marker.len()..].trim().to_string();
                plan.steps = vec![
                    WorkflowStep {
                        step_id: "step-1".to_string(),
                        description: if left.is_empty() { plan.query.clone() } else { left },
                        required_capability: "general_assistance".to_string(),
                        execution_order: 1,
                        dependencies: Vec::new(),
                    },
                    WorkflowStep {
                        step_id: "step-2".to_string(),
                        description: if right.is_empty() { plan.query.clone() } else { right },
                        required_capability: "general_assistance".to_string(),
                        execution_order: 2,
                        dependencies: vec!["step-1".to_string()],
                    },
                ];
            } else if plan.steps.is_empty() {
                plan.steps = vec![WorkflowStep {
                    step_id: "step-1".to_string(),
                    description: plan.query.clone(),
                    required_capability: "general_assistance".to_string(),
                    execution_order: 1,
                    dependencies: Vec::new(),
                }];
            }
        }
    }

    if plan.steps.is_empty() {
        plan.steps = vec![WorkflowStep {
            step_id: "step-1".to_string(),
            description: plan.query.clone(),
            required_capability: "general_assistance".to_string(),
            execution_order: 1,
            dependencies: Vec::new(),
        }];
    }

    if plan.workflow_pattern == WorkflowPattern::SingleAgent {
        plan.orchestration_strategy = Strategy::Single;
    }

    plan
}

/// Keyword-classification fallback used when the reasoning LLM is
/// unreachable or its output is unparseable. Always produces a valid plan.
fn heuristic_plan(query: &str, config: &OrchestratorConfig) -> Plan {
    let is_technical = contains_any(query, &config.technical_keywords);
    let is_creative = contains_any(query, &config.creative_keywords);
    let is_analytical = contains_any(query, &config.analytical_keywords);

    let domain = if is_technical {
        "technical"
    } else if is_creative {
        "creative"
    } else if is_analytical {
        "analytical"
    } else {
        "general"
    };

    let multi = is_technical && is_creative
        || first_connective(query, &config.multi_agent_keywords).is_some();

    // Always start from a single-agent baseline and let `repair` apply the
    // same promotion/split rules the LLM-produced path goes through — this
    // is what actually produces two steps for a connective query instead of
    // a single step mislabeled `multi_agent`.
    let plan = Plan {
        query: query.to_string(),
        intent: "respond to user query".to_string(),
        domain: domain.to_string(),
        complexity: if multi { Complexity::Moderate } else { Complexity::Simple },
        workflow_pattern: WorkflowPattern::SingleAgent,
        orchestration_strategy: Strategy::Single,
        steps: vec![WorkflowStep {
            step_id: "step-1".to_string(),
            description: query.to_string(),
            required_capability: domain.to_string(),
            execution_order: 1,
            dependencies: Vec::new(),
        }],
        success_criteria: "the user's question is answered".to_string(),
        reasoning: "heuristic fallback: reasoning LLM unavailable or returned unparseable output"
            .to_string(),
    };

    repair(plan, config)
}

fn planning_prompt(query: &str) -> String {
    format!(
        "Decompose the following user query into a structured execution plan. \
         Respond with a single JSON object with keys: intent, domain, complexity \
         (simple|moderate|complex), workflow_pattern (single_agent|multi_agent|varying_domain), \
         orchestration_strategy (single|sequential|parallel|hybrid), steps (array of \
         {{description, required_capability, execution_order, dependencies}}), \
         success_criteria, reasoning.\n\nQuery: {}",
        query
    )
}

/// Produce a [`Plan`] for `query`, using `llm` for planning and falling back
/// to the heuristic planner on any LLM or parse failure.
pub async fn plan(
    query: &str,
    llm: &dyn ReasoningLlm,
    config: &OrchestratorConfig,
) -> Result<Plan, PlanError> {
    let opts = CompletionOptions {
        model: config.orchestrator_model.clone(),
        timeout: config.planning_timeout,
    };

    let llm_plan = match llm.complete(&planning_prompt(query), opts).await {
        Ok(text) => parse_llm_response(query, &text),
        Err(_) => None,
    };

    let plan = match llm_plan {
        Some(p) => repair(p, config),
        None => heuristic_plan(query, config),
    };

    if plan.steps.is_empty() {
        return Err(PlanError(
            "neither the reasoning LLM nor the heuristic fallback produced a step".to_string(),
        ));
    }

    Ok(plan)
}

fn parse_llm_response(query: &str, text: &str) -> Option<Plan> {
    let value: Value = extract_json(text)?;
    let raw: RawPlan = serde_json::from_value(value).ok()?;
    Some(plan_from_raw(query, raw))
}

/// Construct a plan synchronously without a reasoning LLM call, for callers
/// that only need the deterministic heuristic path (e.g. tests, or a host
/// operating with planning disabled).
pub fn plan_heuristic(query: &str, config: &OrchestratorConfig) -> Plan {
    heuristic_plan(query, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasoningError;
    use async_trait::async_trait;

    struct FailingLlm;

    #[async_trait]
    impl ReasoningLlm for FailingLlm {
        async fn complete(&self, _prompt: &str, _opts: CompletionOptions) -> Result<String, ReasoningError> {
            Err(ReasoningError("unreachable".to_string()))
        }
    }

    struct StaticLlm(String);

    #[async_trait]
    impl ReasoningLlm for StaticLlm {
        async fn complete(&self, _prompt: &str, _opts: CompletionOptions) -> Result<String, ReasoningError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn falls_back_to_heuristic_on_llm_failure() {
        let config = OrchestratorConfig::default();
        let llm = FailingLlm;
        let p = plan("Write me a short poem about rain.", &llm, &config).await.unwrap();
        assert_eq!(p.workflow_pattern, WorkflowPattern::SingleAgent);
        assert_eq!(p.orchestration_strategy, Strategy::Single);
        assert_eq!(p.steps.len(), 1);
    }

    #[tokio::test]
    async fn promotes_single_agent_on_connective_marker() {
        let config = OrchestratorConfig::default();
        let llm = StaticLlm(
            r#"{"intent":"explain then write","domain":"mixed","complexity":"moderate","workflow_pattern":"single_agent","orchestration_strategy":"sequential","steps":[],"success_criteria":"done","reasoning":"n/a"}"#
                .to_string(),
        );
        let p = plan(
            "Explain 4G PRB utilization and then write a short humorous poem about it.",
            &llm,
            &config,
        )
        .await
        .unwrap();
        assert_eq!(p.workflow_pattern, WorkflowPattern::MultiAgent);
        assert_eq!(p.steps.len(), 2);
        assert_eq!(p.steps[1].dependencies, vec!["step-1".to_string()]);
    }

    #[tokio::test]
    async fn parses_unparseable_llm_output_via_fallback() {
        let config = OrchestratorConfig::default();
        let llm = StaticLlm("not json at all".to_string());
        let p = plan("Analyze customer churn trends.", &llm, &config).await.unwrap();
        assert!(!p.steps.is_empty());
    }

    #[test]
    fn heuristic_plan_is_always_valid() {
        let config = OrchestratorConfig::default();
        let p = heuristic_plan("", &config);
        assert!(!p.steps.is_empty());
    }
}
