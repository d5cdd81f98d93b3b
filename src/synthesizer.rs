//! `C10` — the Final Synthesizer.
//!
//! Given the plan, `SessionMemory.cleaned`, and an optional reflection
//! summary, composes a prompt asking the reasoning LLM for a structured
//! user-facing answer, then cleans the reply with `C3`. If synthesis fails or
//! returns empty text, falls back to a deterministic
//! `"<agentName>: <cleaned>"` concatenation per agent.

use crate::cleaner;
use crate::config::OrchestratorConfig;
use crate::llm::{CompletionOptions, ReasoningLlm};
use crate::memory::{ReflectionSummary, SessionMemory};
use crate::types::Plan;

fn synthesis_prompt(plan: &Plan, memory: &SessionMemory, reflection: Option<&ReflectionSummary>) -> String {
    let mut agent_names = memory.agent_names();
    agent_names.sort();

    let mut contributions = String::new();
    for name in &agent_names {
        if let Some(cleaned) = memory.cleaned(name) {
            contributions.push_str(&format!("\n--- {} ---\n{}\n", name, cleaned));
        }
    }

    let reflection_note = reflection
        .map(|r| format!("\nOverall completeness estimate: {:.2}\n", r.overall_completeness))
        .unwrap_or_default();

    format!(
        "You are composing the final answer to the user's query below, drawing on the \
         contributions of one or more specialist agents. Produce a structured response with an \
         executive summary, an analysis section synthesizing all contributions, and \
         recommendations where applicable. Do not fabricate facts not present in the \
         contributions.\n\nOriginal query: {}\nIntent: {}\nSuccess criteria: {}\n\
         Agent contributions:{}\n{}",
        plan.query, plan.intent, plan.success_criteria, contributions, reflection_note
    )
}

fn fallback_concatenation(memory: &SessionMemory) -> String {
    let mut agent_names = memory.agent_names();
    agent_names.sort();

    agent_names
        .iter()
        .filter_map(|name| memory.cleaned(name).map(|cleaned| format!("{}: {}", name, cleaned)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Compose the final user-facing answer. Never returns raw LLM text — the
/// reply always passes through `C3` first.
pub async fn synthesize(
    plan: &Plan,
    memory: &SessionMemory,
    reflection: Option<&ReflectionSummary>,
    llm: &dyn ReasoningLlm,
    config: &OrchestratorConfig,
) -> String {
    if memory.is_empty() {
        return String::new();
    }

    let prompt = synthesis_prompt(plan, memory, reflection);
    let opts = CompletionOptions {
        model: config.orchestrator_model.clone(),
        timeout: config.synthesis_timeout,
    };

    match llm.complete(&prompt, opts).await {
        Ok(text) => {
            let cleaned = cleaner::clean(&text);
            if cleaned.is_empty() {
                fallback_concatenation(memory)
            } else {
                cleaned
            }
        }
        Err(_) => fallback_concatenation(memory),
    }
}
