//! A multi-agent orchestration runtime.
//!
//! Given a natural-language query and a pool of registered, LLM-backed
//! worker agents, [`Orchestrator`](orchestrator::Orchestrator) decomposes the
//! query into an executable plan, dispatches sub-tasks to agents, coordinates
//! sequential/parallel/hybrid handoffs with context propagation, and
//! synthesizes a final answer — with full observability over every run.
//!
//! The crate is transport-agnostic: it exposes no HTTP surface, config-file
//! loader, or authentication layer. A host application supplies two
//! collaborators — [`worker::AgentInvoker`] (the worker agent service) and
//! [`llm::ReasoningLlm`] (the orchestrator's own reasoning LLM) — and drives
//! [`orchestrator::Orchestrator::orchestrate`] per incoming query.

pub mod agent_store;
pub mod cleaner;
pub mod config;
pub mod dependency;
pub mod error;
pub mod llm;
pub mod matcher;
pub mod memory;
pub mod orchestrator;
pub mod planner;
pub mod refinement;
pub mod scheduler;
pub mod synthesizer;
pub mod tracer;
pub mod types;
pub mod worker;

pub use config::OrchestratorConfig;
pub use error::OrchestratorError;
pub use llm::ReasoningLlm;
pub use orchestrator::{Orchestrator, OrchestrationOutcome};
pub use worker::AgentInvoker;
