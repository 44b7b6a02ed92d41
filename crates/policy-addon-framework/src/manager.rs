//! Registry of agent add-ons handed to the add-on manager

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use policy_addon_common::{Error, Result};

use crate::agent::AgentAddon;

/// Accepts agent add-ons for reconciliation
pub trait AddonManager: Send + Sync {
    /// Register an agent add-on; names must be unique
    fn add_agent(&self, agent: Arc<dyn AgentAddon>) -> Result<()>;
}

/// Thread-safe [`AddonManager`] keyed by add-on name
#[derive(Default)]
pub struct AddonRegistry {
    agents: DashMap<String, Arc<dyn AgentAddon>>,
}

impl AddonRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an agent by add-on name
    pub fn get(&self, name: &str) -> Option<Arc<dyn AgentAddon>> {
        self.agents.get(name).map(|agent| agent.value().clone())
    }

    /// Registered add-on names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Number of registered add-ons
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no add-on is registered
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl AddonManager for AddonRegistry {
    fn add_agent(&self, agent: Arc<dyn AgentAddon>) -> Result<()> {
        let name = agent.name().to_string();
        match self.agents.entry(name.clone()) {
            Entry::Occupied(_) => Err(Error::validation_for_field(
                name,
                "name",
                "an agent with the same name is already registered",
            )),
            Entry::Vacant(slot) => {
                slot.insert(agent);
                info!(addon = %name, "registered agent add-on");
                Ok(())
            }
        }
    }
}
