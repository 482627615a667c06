//! Query-time retrieval.
//!
//! The [`Retriever`] owns an [`IndexRegistry`] (one loaded index per agent,
//! built at startup), the shared embedding provider, and the retrieval
//! settings. Retrieval never fails outward: unknown agents, missing indexes,
//! empty queries, and search errors all degrade to an empty result, with the
//! cause logged.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agents::AgentSet;
use crate::citation::{Citation, CitationStyle};
use crate::config::{Config, RetrievalConfig};
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::index::{IndexStats, PassageIndex};
use crate::store::IndexStore;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "and", "a", "to", "are", "as", "was", "will", "be",
];

/// Lowercase, collapse whitespace, and drop stop words.
pub fn preprocess_query(query: &str) -> String {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Loaded indexes keyed by agent name.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: HashMap<String, Arc<PassageIndex>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every agent's persisted index. Agents without an index, or whose
    /// index fails to load or was built with a different model, are left out.
    pub fn load(agents: &AgentSet, store: &IndexStore, provider: &dyn EmbeddingProvider) -> Self {
        let mut registry = Self::new();
        for agent in agents.names() {
            if !store.exists(agent) {
                info!("{}: no knowledge base found", agent);
                continue;
            }
            match store.load(agent) {
                Ok(index) => {
                    if let Err(e) = index.check_compatible(provider) {
                        warn!("{}: knowledge base unavailable: {}", agent, e);
                        continue;
                    }
                    info!("{}: loaded {} passages", agent, index.len());
                    registry.insert(agent, index);
                }
                Err(e) => warn!("{}: knowledge base unavailable: {}", agent, e),
            }
        }
        registry
    }

    pub fn insert(&mut self, agent: &str, index: PassageIndex) {
        self.indexes.insert(agent.to_string(), Arc::new(index));
    }

    pub fn get(&self, agent: &str) -> Option<&Arc<PassageIndex>> {
        self.indexes.get(agent)
    }

    /// Agent names with a loaded index, sorted.
    pub fn agents(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }
}

/// Effective search parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub top_k: usize,
    pub min_similarity: f32,
}

pub struct Retriever {
    registry: IndexRegistry,
    provider: Arc<dyn EmbeddingProvider>,
    agents: AgentSet,
    retrieval: RetrievalConfig,
    style: CitationStyle,
}

impl Retriever {
    pub fn new(
        registry: IndexRegistry,
        provider: Arc<dyn EmbeddingProvider>,
        agents: AgentSet,
        retrieval: RetrievalConfig,
    ) -> Self {
        let style = CitationStyle::from(&retrieval);
        Self {
            registry,
            provider,
            agents,
            retrieval,
            style,
        }
    }

    /// Create the provider and load every agent's index from the processed directory.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider: Arc<dyn EmbeddingProvider> = Arc::from(create_provider(&config.embedding)?);
        let agents = AgentSet::from_config(&config.agents);
        let store = IndexStore::new(&config.paths.processed);
        let registry = IndexRegistry::load(&agents, &store, provider.as_ref());
        Ok(Self::new(registry, provider, agents, config.retrieval.clone()))
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    pub fn agents(&self) -> &AgentSet {
        &self.agents
    }

    /// Configured defaults for `agent`, with its per-agent overrides applied.
    pub fn params_for(&self, agent: &str) -> RetrievalParams {
        let overrides = self.retrieval.agents.get(agent);
        RetrievalParams {
            top_k: overrides
                .and_then(|o| o.top_k)
                .unwrap_or(self.retrieval.top_k),
            min_similarity: overrides
                .and_then(|o| o.min_similarity)
                .unwrap_or(self.retrieval.min_similarity),
        }
    }

    /// Search one agent's knowledge base. `agent` may be an agent name or a
    /// topic alias; `None` parameters fall back to the agent's defaults.
    pub fn retrieve(
        &self,
        agent: &str,
        query: &str,
        top_k: Option<usize>,
        min_similarity: Option<f32>,
    ) -> Vec<Citation> {
        let Some(agent) = self.agents.resolve(agent) else {
            debug!("unknown agent '{}'", agent);
            return Vec::new();
        };
        let Some(index) = self.registry.get(agent) else {
            debug!("{}: no knowledge base loaded", agent);
            return Vec::new();
        };

        let processed = preprocess_query(query);
        if processed.is_empty() {
            return Vec::new();
        }

        let defaults = self.params_for(agent);
        let top_k = top_k.unwrap_or(defaults.top_k);
        let min_similarity = min_similarity.unwrap_or(defaults.min_similarity);

        match index.search(self.provider.as_ref(), &processed, top_k, min_similarity) {
            Ok(hits) => {
                debug!("{}: {} passages for '{}'", agent, hits.len(), processed);
                hits.iter().map(|hit| self.style.cite(hit)).collect()
            }
            Err(e) => {
                warn!("{}: search failed: {}", agent, e);
                Vec::new()
            }
        }
    }

    /// Search several agents independently. Results are keyed by the
    /// canonical agent name; agents with no results are omitted.
    pub fn retrieve_multi(
        &self,
        query: &str,
        agents: &[String],
        top_k: Option<usize>,
    ) -> BTreeMap<String, Vec<Citation>> {
        let mut out = BTreeMap::new();
        for name in agents {
            let Some(agent) = self.agents.resolve(name) else {
                continue;
            };
            let citations = self.retrieve(agent, query, top_k, None);
            if !citations.is_empty() {
                out.insert(agent.to_string(), citations);
            }
        }
        out
    }

    /// Agents with a loaded knowledge base.
    pub fn available_agents(&self) -> Vec<String> {
        self.registry.agents()
    }

    pub fn knowledge_stats(&self) -> BTreeMap<String, IndexStats> {
        self.registry
            .indexes
            .iter()
            .map(|(agent, index)| (agent.clone(), index.stats()))
            .collect()
    }
}
