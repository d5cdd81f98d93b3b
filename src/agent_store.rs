//! `C1` — the Agent Descriptor Store.
//!
//! An in-memory, read-mostly set of registered agents. Register/unregister
//! are guarded by a reader-writer lock per the concurrency model (§5); the
//! scheduler takes an immutable snapshot at session start and does not
//! observe later changes, matching the invariant that agent descriptors are
//! immutable during a session.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::types::AgentDescriptor;

/// Registry of agent descriptors, shared across sessions.
#[derive(Default)]
pub struct AgentDescriptorStore {
    agents: RwLock<HashMap<String, AgentDescriptor>>,
}

impl AgentDescriptorStore {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Register an agent, replacing any prior descriptor with the same id.
    pub async fn register(&self, descriptor: AgentDescriptor) {
        let mut agents = self.agents.write().await;
        agents.insert(descriptor.agent_id.clone(), descriptor);
    }

    /// Remove and return a previously registered descriptor.
    pub async fn unregister(&self, agent_id: &str) -> Option<AgentDescriptor> {
        let mut agents = self.agents.write().await;
        agents.remove(agent_id)
    }

    /// List all registered agents in no particular order.
    pub async fn list(&self) -> Vec<AgentDescriptor> {
        let agents = self.agents.read().await;
        agents.values().cloned().collect()
    }

    /// Take an immutable snapshot of all registered agents for use by a
    /// single session. The snapshot does not observe subsequent
    /// register/unregister calls.
    pub async fn snapshot(self: &Arc<Self>) -> Vec<AgentDescriptor> {
        self.list().await
    }

    pub async fn get(&self, agent_id: &str) -> Option<AgentDescriptor> {
        let agents = self.agents.read().await;
        agents.get(agent_id).cloned()
    }
}
