//! The closed set of agents and their topic aliases.

use std::collections::BTreeMap;

use crate::config::AgentsConfig;

/// Agent identifiers plus the topic names that resolve to them.
#[derive(Debug, Clone)]
pub struct AgentSet {
    names: Vec<String>,
    aliases: BTreeMap<String, String>,
}

impl AgentSet {
    pub fn from_config(config: &AgentsConfig) -> Self {
        Self {
            names: config.names.clone(),
            aliases: config.aliases(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Resolves an agent name or topic alias (case-insensitive) to the
    /// canonical agent name. Unknown names resolve to `None`.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        let key = name.trim().to_lowercase();
        if let Some(agent) = self.names.iter().find(|n| **n == key) {
            return Some(agent.as_str());
        }
        self.aliases.get(&key).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }
}
