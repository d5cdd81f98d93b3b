//! `C9` — Session Memory.
//!
//! Per-session raw/cleaned/meta maps keyed by agent name. `record` is the
//! only write path: it stores the raw text, runs it through the text cleaner
//! (`C3`), stores the cleaned text, and stamps metadata. Downstream agents
//! and the synthesizer only ever read `cleaned`. Grounded in the
//! specification's invariant that `cleaned[name] == Clean(raw[name])` always
//! holds by construction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::cleaner;
use crate::types::ExecutionStatus;

#[derive(Debug, Clone)]
pub struct RecordMeta {
    pub recorded_at: DateTime<Utc>,
    pub status: ExecutionStatus,
    pub tools_used: Vec<String>,
}

/// Per-agent quality summary produced by [`SessionMemory::reflect`].
#[derive(Debug, Clone)]
pub struct QualityAnalysis {
    pub agent_name: String,
    pub word_count: usize,
    pub char_count: usize,
    pub has_structure: bool,
    pub completeness_ratio: f32,
    pub recommendation: String,
}

/// Overall quality summary for a session, produced by [`SessionMemory::reflect`].
#[derive(Debug, Clone)]
pub struct ReflectionSummary {
    pub session_id: String,
    pub per_agent: Vec<QualityAnalysis>,
    pub overall_completeness: f32,
}

/// Per-session memory. Not `Send`-shared across sessions — owned by the
/// scheduler for the lifetime of one orchestration run.
#[derive(Debug, Default)]
pub struct SessionMemory {
    pub session_id: String,
    raw: HashMap<String, String>,
    cleaned: HashMap<String, String>,
    meta: HashMap<String, RecordMeta>,
}

impl SessionMemory {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            raw: HashMap::new(),
            cleaned: HashMap::new(),
            meta: HashMap::new(),
        }
    }

    /// Record `raw_text` from `agent_name`: stores it verbatim, cleans it,
    /// stores the cleaned form, and stamps metadata.
    pub fn record(&mut self, agent_name: &str, raw_text: &str, status: ExecutionStatus, tools_used: Vec<String>) {
        let cleaned_text = cleaner::clean(raw_text);
        self.raw.insert(agent_name.to_string(), raw_text.to_string());
        self.cleaned.insert(agent_name.to_string(), cleaned_text);
        self.meta.insert(
            agent_name.to_string(),
            RecordMeta {
                recorded_at: Utc::now(),
                status,
                tools_used,
            },
        );
    }

    pub fn raw(&self, agent_name: &str) -> Option<&str> {
        self.raw.get(agent_name).map(String::as_str)
    }

    pub fn cleaned(&self, agent_name: &str) -> Option<&str> {
        self.cleaned.get(agent_name).map(String::as_str)
    }

    pub fn meta(&self, agent_name: &str) -> Option<&RecordMeta> {
        self.meta.get(agent_name)
    }

    pub fn agent_names(&self) -> Vec<String> {
        self.cleaned.keys().cloned().collect()
    }

    pub fn cleaned_map(&self) -> &HashMap<String, String> {
        &self.cleaned
    }

    pub fn is_empty(&self) -> bool {
        self.cleaned.is_empty()
    }

    /// Produce a per-agent and overall quality summary: word/char counts,
    /// presence of structural markers (headings, bullets, numbered lists),
    /// and a completeness ratio against a nominal useful-response length.
    pub fn reflect(&self) -> ReflectionSummary {
        const NOMINAL_LENGTH: f32 = 200.0;

        let mut per_agent = Vec::new();
        for name in self.cleaned.keys() {
            let text = self.cleaned.get(name).map(String::as_str).unwrap_or_default();
            let word_count = text.split_whitespace().count();
            let char_count = text.chars().count();
            let has_structure = text.contains('\n')
                && (text.contains("- ") || text.contains("1.") || text.contains('#'));
            let completeness_ratio = (char_count as f32 / NOMINAL_LENGTH).min(1.0);

            let recommendation = if char_count == 0 {
                "agent produced no usable output; consider re-running or excluding from synthesis".to_string()
            } else if completeness_ratio < 0.3 {
                "output is terse; consider an enrich_minimal refinement before downstream use".to_string()
            } else {
                "output looks complete".to_string()
            };

            per_agent.push(QualityAnalysis {
                agent_name: name.clone(),
                word_count,
                char_count,
                has_structure,
                completeness_ratio,
                recommendation,
            });
        }

        per_agent.sort_by(|a, b| a.agent_name.cmp(&b.agent_name));

        let overall_completeness = if per_agent.is_empty() {
            0.0
        } else {
            per_agent.iter().map(|a| a.completeness_ratio).sum::<f32>() / per_agent.len() as f32
        };

        ReflectionSummary {
            session_id: self.session_id.clone(),
            per_agent,
            overall_completeness,
        }
    }
}
