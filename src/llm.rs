//! The reasoning-LLM boundary and the JSON-from-LLM parsing helper.
//!
//! The orchestrator's own "reasoning LLM" (used for planning, scoring
//! assistance, context analysis/refinement, and final synthesis) is
//! abstracted as [`ReasoningLlm`], matching the specification's
//! `Complete(model, prompt, opts) → text` contract. This keeps the engine
//! independent of any particular LLM Invocation Service, the same way the
//! teacher crate keeps `Agent` independent of any particular
//! `ClientWrapper` implementation.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ReasoningError;

/// Per-call options forwarded to the reasoning LLM.
#[derive(Debug, Clone)]
pub struct CompletionOptions {
    pub model: String,
    pub timeout: Duration,
}

/// Abstracts the orchestrator's own reasoning LLM.
#[async_trait]
pub trait ReasoningLlm: Send + Sync {
    async fn complete(&self, prompt: &str, opts: CompletionOptions) -> Result<String, ReasoningError>;
}

/// Forgiving JSON extraction: find the first `{` and the last `}` in `text`
/// and attempt to parse the slice between them. Per the specification's
/// "JSON-from-LLM parsing" design note, this never raises across the
/// component boundary purely due to LLM malformation — callers fall back to
/// a heuristic instead of propagating the parse error.
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}
