//! `C4` — the Context Refinement Engine.
//!
//! `Refine(context, kind, fromAgent, toAgent) -> (refinedContext, metadata)`.
//! Grounded in `dynamic_context_refinement_engine.py`: the strategy is picked
//! deterministically from a context analysis (complexity, information
//! density, quality, length against the target agent's `maxContextLength`),
//! then the reasoning LLM is asked to produce a refined string per strategy.
//! Refinement history is bounded and feeds `refinement_statistics`.

use std::collections::HashMap;
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::config::OrchestratorConfig;
use crate::llm::{CompletionOptions, ReasoningLlm};

const HISTORY_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefinementStrategy {
    SimplifyComplex,
    EnrichMinimal,
    ExtractKeyInfo,
    FocusOnTask,
    Adaptive,
}

impl RefinementStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RefinementStrategy::SimplifyComplex => "simplify_complex",
            RefinementStrategy::EnrichMinimal => "enrich_minimal",
            RefinementStrategy::ExtractKeyInfo => "extract_key_info",
            RefinementStrategy::FocusOnTask => "focus_on_task",
            RefinementStrategy::Adaptive => "adaptive",
        }
    }
}

/// Heuristic analysis of a context string ahead of refinement. Each measure
/// is a synthetic, cheap-to-compute proxy over word/sentence statistics —
/// there is no reasoning-LLM round trip required to pick a strategy.
struct ContextAnalysis {
    complexity: f32,
    information_density: f32,
    quality: f32,
}

fn analyze(context: &str) -> ContextAnalysis {
    let words: Vec<&str> = context.split_whitespace().collect();
    let word_count = words.len().max(1) as f32;
    let sentence_count = context.matches(['.', '!', '?']).count().max(1) as f32;
    let avg_sentence_len = word_count / sentence_count;
    let unique_ratio = {
        let mut seen = std::collections::HashSet::new();
        for w in &words {
            seen.insert(w.to_ascii_lowercase());
        }
        seen.len() as f32 / word_count
    };

    let complexity = (avg_sentence_len / 30.0).min(1.0);
    let information_density = unique_ratio;
    let quality = (0.4 + 0.6 * unique_ratio).min(1.0);

    ContextAnalysis {
        complexity,
        information_density,
        quality,
    }
}

fn choose_strategy(analysis: &ContextAnalysis, context_len: usize, max_context_length: usize) -> RefinementStrategy {
    if analysis.complexity > 0.8 {
        RefinementStrategy::SimplifyComplex
    } else if analysis.information_density < 0.3 {
        RefinementStrategy::EnrichMinimal
    } else if analysis.quality < 0.4 {
        RefinementStrategy::ExtractKeyInfo
    } else if context_len > max_context_length {
        RefinementStrategy::FocusOnTask
    } else {
        RefinementStrategy::Adaptive
    }
}

fn refinement_prompt(strategy: RefinementStrategy, context: &str, task: &str, max_len: usize) -> String {
    match strategy {
        RefinementStrategy::SimplifyComplex => format!(
            "Simplify the following context into clear, direct language while preserving every \
             fact relevant to the task \"{task}\". Context:\n{context}"
        ),
        RefinementStrategy::EnrichMinimal => format!(
            "The following context is sparse. Expand it with explicit structure (headings, \
             bullet points) without inventing new facts, to better support the task \"{task}\". \
             Context:\n{context}"
        ),
        RefinementStrategy::ExtractKeyInfo => format!(
            "Extract only the information relevant to the task \"{task}\" from the following \
             context, discarding the rest. Context:\n{context}"
        ),
        RefinementStrategy::FocusOnTask => format!(
            "Condense the following context to at most {max_len} characters, keeping only what \
             is relevant to the task \"{task}\". Context:\n{context}"
        ),
        RefinementStrategy::Adaptive => format!(
            "Adapt the following context so it is maximally useful for the task \"{task}\", \
             adjusting detail level as needed. Context:\n{context}"
        ),
    }
}

fn quality_score(original: &str, refined: &str) -> f32 {
    let orig_len = original.len().max(1) as f32;
    let refined_len = refined.len() as f32;
    let len_ratio = refined_len / orig_len;
    (0.8 * (1.0 - (len_ratio - 0.5).abs())).min(1.0).max(0.0)
}

/// One entry in the bounded refinement history, used for statistics.
#[derive(Debug, Clone)]
pub struct ContextMetadata {
    pub kind: String,
    pub from_agent: String,
    pub to_agent: String,
    pub strategy: RefinementStrategy,
    pub original_len: usize,
    pub refined_len: usize,
    pub quality: f32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct RefinementStatistics {
    pub total_refinements: u64,
    pub average_quality: f32,
    pub average_length_reduction: f32,
    pub strategy_distribution: HashMap<String, u64>,
}

pub struct ContextRefinementEngine {
    history: Mutex<VecDeque<ContextMetadata>>,
}

impl ContextRefinementEngine {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(HISTORY_CAPACITY)),
        }
    }

    /// Refine `context` for a handoff from `from_agent` to `to_agent`
    /// performing `task`, bounded by `max_context_length`. Falls back to the
    /// deterministically-cleaned original (strategy `adaptive`, quality 0.5)
    /// if the reasoning LLM call fails.
    pub async fn refine(
        &self,
        context: &str,
        kind: &str,
        from_agent: &str,
        to_agent: &str,
        task: &str,
        max_context_length: usize,
        llm: &dyn ReasoningLlm,
        config: &OrchestratorConfig,
    ) -> (String, ContextMetadata) {
        let analysis = analyze(context);
        let strategy = choose_strategy(&analysis, context.len(), max_context_length);
        let prompt = refinement_prompt(strategy, context, task, max_context_length);

        let opts = CompletionOptions {
            model: config.orchestrator_model.clone(),
            timeout: config.refinement_timeout,
        };

        let (refined, strategy, quality) = match llm.complete(&prompt, opts).await {
            Ok(text) if !text.trim().is_empty() => {
                let cleaned = crate::cleaner::clean(&text);
                let q = quality_score(context, &cleaned);
                (cleaned, strategy, q)
            }
            _ => (crate::cleaner::clean(context), RefinementStrategy::Adaptive, 0.5),
        };

        let metadata = ContextMetadata {
            kind: kind.to_string(),
            from_agent: from_agent.to_string(),
            to_agent: to_agent.to_string(),
            strategy,
            original_len: context.len(),
            refined_len: refined.len(),
            quality,
            timestamp: Utc::now(),
        };

        {
            let mut history = self.history.lock().await;
            if history.len() == HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(metadata.clone());
        }

        (refined, metadata)
    }

    pub async fn statistics(&self) -> RefinementStatistics {
        let history = self.history.lock().await;
        if history.is_empty() {
            return RefinementStatistics::default();
        }

        let total = history.len() as f32;
        let mut quality_sum = 0.0f32;
        let mut reduction_sum = 0.0f32;
        let mut distribution: HashMap<String, u64> = HashMap::new();

        for entry in history.iter() {
            quality_sum += entry.quality;
            if entry.original_len > 0 {
                reduction_sum += 1.0 - (entry.refined_len as f32 / entry.original_len as f32);
            }
            *distribution.entry(entry.strategy.as_str().to_string()).or_insert(0) += 1;
        }

        RefinementStatistics {
            total_refinements: history.len() as u64,
            average_quality: quality_sum / total,
            average_length_reduction: reduction_sum / total,
            strategy_distribution: distribution,
        }
    }
}

impl Default for ContextRefinementEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasoningError;
    use async_trait::async_trait;

    struct EchoLlm;

    #[async_trait]
    impl ReasoningLlm for EchoLlm {
        async fn complete(&self, prompt: &str, _opts: CompletionOptions) -> Result<String, ReasoningError> {
            Ok(format!("refined: {}", &prompt[..prompt.len().min(40)]))
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl ReasoningLlm for FailingLlm {
        async fn complete(&self, _prompt: &str, _opts: CompletionOptions) -> Result<String, ReasoningError> {
            Err(ReasoningError("down".to_string()))
        }
    }

    #[tokio::test]
    async fn falls_back_to_cleaned_original_on_llm_failure() {
        let engine = ContextRefinementEngine::new();
        let config = OrchestratorConfig::default();
        let llm = FailingLlm;
        let (refined, meta) = engine
            .refine("Some context.", "task_handoff", "A", "B", "summarize", 1000, &llm, &config)
            .await;
        assert_eq!(refined, "Some context.");
        assert_eq!(meta.quality, 0.5);
        assert_eq!(meta.strategy, RefinementStrategy::Adaptive);
    }

    #[tokio::test]
    async fn quality_score_is_bounded() {
        assert!(quality_score("a".repeat(100).as_str(), "b".repeat(50).as_str()) <= 1.0);
        assert!(quality_score("a".repeat(100).as_str(), "") >= 0.0);
    }

    #[tokio::test]
    async fn statistics_track_refinement_count_and_strategy_distribution() {
        let engine = ContextRefinementEngine::new();
        let config = OrchestratorConfig::default();
        let llm = EchoLlm;
        engine
            .refine("Short context.", "task_handoff", "A", "B", "task", 1000, &llm, &config)
            .await;
        let stats = engine.statistics().await;
        assert_eq!(stats.total_refinements, 1);
        assert!(stats.strategy_distribution.values().sum::<u64>() == 1);
    }

    #[test]
    fn focus_on_task_chosen_when_context_exceeds_max_length() {
        let analysis = ContextAnalysis {
            complexity: 0.2,
            information_density: 0.9,
            quality: 0.9,
        };
        let strategy = choose_strategy(&analysis, 2000, 1000);
        assert_eq!(strategy, RefinementStrategy::FocusOnTask);
    }
}
