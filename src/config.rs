//! Configuration parsing and validation.
//!
//! The knowledge base is driven by a single TOML file. Every section is
//! optional; missing values fall back to the defaults below.
//!
//! ```toml
//! [paths]
//! raw_pdfs = "./knowledge_base/raw_pdfs"
//! processed = "./knowledge_base/processed"
//!
//! [chunking]
//! chunk_size = 600
//! chunk_overlap = 100
//!
//! [retrieval]
//! top_k = 4
//! min_similarity = 0.2
//!
//! [retrieval.agents.nyaya]
//! min_similarity = 0.3
//!
//! [embedding]
//! provider = "local"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    /// Source PDFs, one subdirectory per agent.
    #[serde(default = "default_raw_pdfs")]
    pub raw_pdfs: PathBuf,
    /// Persisted indexes, one subdirectory per agent.
    #[serde(default = "default_processed")]
    pub processed: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_pdfs: default_raw_pdfs(),
            processed: default_processed(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
        }
    }
}

fn default_raw_pdfs() -> PathBuf {
    PathBuf::from("./knowledge_base/raw_pdfs")
}
fn default_processed() -> PathBuf {
    PathBuf::from("./knowledge_base/processed")
}
fn default_include_globs() -> Vec<String> {
    vec!["**/*.pdf".to_string()]
}

impl PathsConfig {
    pub fn agent_pdf_dir(&self, agent: &str) -> PathBuf {
        self.raw_pdfs.join(agent)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AgentsConfig {
    #[serde(default = "default_agent_names")]
    pub names: Vec<String>,
    /// Topic name → agent name. When omitted, the built-in topic aliases
    /// whose target is a configured agent are used.
    #[serde(default)]
    pub aliases: Option<BTreeMap<String, String>>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            names: default_agent_names(),
            aliases: None,
        }
    }
}

impl AgentsConfig {
    /// The effective alias table.
    pub fn aliases(&self) -> BTreeMap<String, String> {
        match &self.aliases {
            Some(explicit) => explicit.clone(),
            None => default_agent_aliases()
                .into_iter()
                .filter(|(_, target)| self.names.contains(target))
                .collect(),
        }
    }
}

fn default_agent_names() -> Vec<String> {
    ["maaya", "gynika", "meher", "nyaya", "vaanya"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_agent_aliases() -> BTreeMap<String, String> {
    [
        ("maternal", "maaya"),
        ("reproductive", "gynika"),
        ("mental", "meher"),
        ("legal", "nyaya"),
        ("feminist", "vaanya"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Sliding-window chunking parameters. All sizes are in characters.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_min_chunk_chars")]
    pub min_chunk_chars: usize,
    #[serde(default = "default_sentence_lookahead")]
    pub sentence_lookahead: usize,
    #[serde(default = "default_paragraph_lookahead")]
    pub paragraph_lookahead: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_chars: default_min_chunk_chars(),
            sentence_lookahead: default_sentence_lookahead(),
            paragraph_lookahead: default_paragraph_lookahead(),
        }
    }
}

fn default_chunk_size() -> usize {
    600
}
fn default_chunk_overlap() -> usize {
    100
}
fn default_min_chunk_chars() -> usize {
    50
}
fn default_sentence_lookahead() -> usize {
    100
}
fn default_paragraph_lookahead() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f32,
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f32,
    #[serde(default = "default_medium_confidence")]
    pub medium_confidence: f32,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_excerpt_chars")]
    pub excerpt_chars: usize,
    /// Per-agent overrides of `top_k` / `min_similarity`.
    #[serde(default)]
    pub agents: BTreeMap<String, AgentRetrievalConfig>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            high_confidence: default_high_confidence(),
            medium_confidence: default_medium_confidence(),
            preview_chars: default_preview_chars(),
            excerpt_chars: default_excerpt_chars(),
            agents: BTreeMap::new(),
        }
    }
}

fn default_top_k() -> usize {
    4
}
fn default_min_similarity() -> f32 {
    0.2
}
fn default_high_confidence() -> f32 {
    0.8
}
fn default_medium_confidence() -> f32 {
    0.5
}
fn default_preview_chars() -> usize {
    200
}
fn default_excerpt_chars() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AgentRetrievalConfig {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `local`, `hash`, or `disabled`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        // Validate agents
        if self.agents.names.is_empty() {
            anyhow::bail!("agents.names must list at least one agent");
        }
        let mut seen = HashSet::new();
        for name in &self.agents.names {
            if !is_valid_agent_name(name) {
                anyhow::bail!(
                    "invalid agent name '{}': use lowercase letters, digits, '-' or '_'",
                    name
                );
            }
            if !seen.insert(name.as_str()) {
                anyhow::bail!("duplicate agent name '{}'", name);
            }
        }
        for (alias, target) in self.agents.aliases.iter().flatten() {
            if !is_valid_agent_name(alias) {
                anyhow::bail!(
                    "invalid alias '{}': use lowercase letters, digits, '-' or '_'",
                    alias
                );
            }
            if seen.contains(alias.as_str()) {
                anyhow::bail!("alias '{}' shadows an agent name", alias);
            }
            if !seen.contains(target.as_str()) {
                anyhow::bail!("alias '{}' points to unknown agent '{}'", alias, target);
            }
        }

        // Validate chunking
        let c = &self.chunking;
        if c.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if c.chunk_overlap >= c.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                c.chunk_overlap,
                c.chunk_size
            );
        }
        if c.min_chunk_chars > c.chunk_size {
            anyhow::bail!("chunking.min_chunk_chars must be <= chunking.chunk_size");
        }

        // Validate retrieval
        let r = &self.retrieval;
        if r.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }
        if !(-1.0..=1.0).contains(&r.min_similarity) {
            anyhow::bail!("retrieval.min_similarity must be in [-1.0, 1.0]");
        }
        if r.medium_confidence > r.high_confidence {
            anyhow::bail!("retrieval.medium_confidence must be <= retrieval.high_confidence");
        }
        if r.preview_chars == 0 || r.excerpt_chars == 0 {
            anyhow::bail!("retrieval.preview_chars and retrieval.excerpt_chars must be > 0");
        }
        for (agent, overrides) in &r.agents {
            if !seen.contains(agent.as_str()) {
                anyhow::bail!("retrieval.agents.{} refers to an unknown agent", agent);
            }
            if overrides.top_k == Some(0) {
                anyhow::bail!("retrieval.agents.{}.top_k must be >= 1", agent);
            }
            if let Some(min) = overrides.min_similarity {
                if !(-1.0..=1.0).contains(&min) {
                    anyhow::bail!("retrieval.agents.{}.min_similarity must be in [-1.0, 1.0]", agent);
                }
            }
        }

        // Validate embedding
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        if self.embedding.dims == Some(0) {
            anyhow::bail!("embedding.dims must be > 0");
        }
        match self.embedding.provider.as_str() {
            "disabled" | "hash" | "local" => {}
            other => anyhow::bail!(
                "Unknown embedding provider: '{}'. Must be disabled, hash, or local.",
                other
            ),
        }

        Ok(())
    }
}

fn is_valid_agent_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.chunk_size, 600);
        assert_eq!(config.chunking.chunk_overlap, 100);
        assert_eq!(config.retrieval.top_k, 4);
        assert!((config.retrieval.min_similarity - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.agents.names.len(), 5);
        assert_eq!(config.agents.aliases().get("legal").map(String::as_str), Some("nyaya"));
        assert_eq!(config.embedding.provider, "local");
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = parse("[chunking]\nchunk_size = 100\nchunk_overlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn test_alias_to_unknown_agent_rejected() {
        let err = parse("[agents]\nnames = [\"maaya\"]\n[agents.aliases]\nlegal = \"nyaya\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("unknown agent"));
    }

    #[test]
    fn test_renamed_agents_without_aliases_load() {
        let config = parse("[agents]\nnames = [\"asha\", \"maaya\"]\n").unwrap();
        let aliases = config.agents.aliases();
        assert_eq!(aliases.get("maternal").map(String::as_str), Some("maaya"));
        assert!(!aliases.contains_key("legal"));
    }

    #[test]
    fn test_alias_keys_must_be_lowercase_names() {
        let err = parse("[agents.aliases]\nMaternal = \"maaya\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid alias 'Maternal'"));
        assert!(parse("[agents.aliases]\n\"legal aid\" = \"nyaya\"\n").is_err());
        assert!(parse("[agents.aliases]\nmeher = \"maaya\"\n").is_err());
    }

    #[test]
    fn test_agent_names_must_be_path_safe() {
        assert!(parse("[agents]\nnames = [\"../etc\"]\naliases = {}\n").is_err());
        assert!(parse("[agents]\nnames = [\"a\", \"a\"]\naliases = {}\n").is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_per_agent_overrides() {
        let config = parse("[retrieval.agents.nyaya]\nmin_similarity = 0.35\n").unwrap();
        let nyaya = &config.retrieval.agents["nyaya"];
        assert_eq!(nyaya.top_k, None);
        assert_eq!(nyaya.min_similarity, Some(0.35));
        assert!(parse("[retrieval.agents.nobody]\ntop_k = 2\n").is_err());
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/kb.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
