//! Configuration for the orchestration engine.
//!
//! This struct is intentionally minimal and constructed manually by the host
//! application — no TOML/YAML/env-parsing dependency is introduced, since
//! config-file loading is explicitly out of scope for the core (the same
//! stance the teacher crate takes with [`CloudLLMConfig`](crate)).
//!
//! # Example
//!
//! ```rust
//! use a2a_orchestrator::config::OrchestratorConfig;
//!
//! let config = OrchestratorConfig::default();
//! assert_eq!(config.min_agent_score_threshold, 0.3);
//! assert_eq!(config.max_concurrency, 5);
//! ```

use std::collections::HashMap;
use std::time::Duration;

/// Global configuration for the orchestration engine.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Opaque identifier of the reasoning LLM used for planning, scoring
    /// assistance, refinement, and synthesis.
    pub orchestrator_model: String,

    /// Connective markers that, when present in a query, promote a
    /// single-agent plan to multi-agent (§4.1 rule 1).
    pub multi_agent_keywords: Vec<String>,

    /// Keyword set used to detect a "technical" marker in a query, for the
    /// technical+creative co-occurrence promotion rule and for the
    /// heuristic planner's fallback classification.
    pub technical_keywords: Vec<String>,

    /// Keyword set used to detect a "creative" marker, disjoint from
    /// `technical_keywords`.
    pub creative_keywords: Vec<String>,

    /// Keyword set used by the heuristic planner to classify a query as
    /// analytical when neither technical nor creative markers dominate.
    pub analytical_keywords: Vec<String>,

    /// Minimum agent/step score accepted without falling back to the
    /// overall top-scoring agent.
    pub min_agent_score_threshold: f32,

    /// Per-session bound on concurrently in-flight agent invocations.
    pub max_concurrency: usize,

    /// Process-wide bound on concurrently in-flight agent invocations
    /// across all sessions.
    pub max_in_flight_agents: usize,

    /// Hard per-agent invocation timeout.
    pub agent_execution_timeout: Duration,

    /// Reasoning-LLM timeout used by the query planner.
    pub planning_timeout: Duration,

    /// Reasoning-LLM timeout used by the context refinement engine.
    pub refinement_timeout: Duration,

    /// Reasoning-LLM timeout used by the final synthesizer.
    pub synthesis_timeout: Duration,

    /// Capability → required-capabilities table consumed by the dependency
    /// graph builder (`C7`).
    pub capability_dependencies: HashMap<String, Vec<String>>,

    /// Whether the synthesizer may still produce a partial answer when a
    /// session was cancelled but at least one agent completed.
    pub synthesize_on_partial: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            orchestrator_model: String::from("orchestrator-default"),
            multi_agent_keywords: [
                "and then",
                "then use that to",
                "then create",
                "then write",
                "and create",
                "and write",
                "and generate",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            technical_keywords: [
                "network", "protocol", "utilization", "bandwidth", "latency", "analyze",
                "configuration", "infrastructure", "algorithm", "architecture", "technical",
                "system", "database", "api", "code", "implementation",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            creative_keywords: [
                "poem", "story", "write", "creative", "imagine", "compose", "humorous",
                "funny", "narrative", "song", "haiku", "joke",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            analytical_keywords: [
                "compare", "evaluate", "summarize", "assess", "report", "trend", "metric",
                "statistics", "churn", "forecast",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_agent_score_threshold: 0.3,
            max_concurrency: 5,
            max_in_flight_agents: 64,
            agent_execution_timeout: Duration::from_secs(120),
            planning_timeout: Duration::from_secs(60),
            refinement_timeout: Duration::from_secs(30),
            synthesis_timeout: Duration::from_secs(60),
            capability_dependencies: HashMap::new(),
            synthesize_on_partial: true,
        }
    }
}
