//! Build pipeline orchestration.
//!
//! Coordinates the offline flow for one agent: discover PDFs → extract
//! pages → chunk → embed → persist. Documents are extracted and chunked in
//! parallel with rayon (order preserved); embedding and the atomic save run
//! under the agent's build lock.
//!
//! Also hosts the other administrative operations: adding PDFs to an
//! agent's source directory, removing an agent's index, and creating the
//! directory layout.

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::agents::AgentSet;
use crate::chunk::chunk_document;
use crate::config::{ChunkingConfig, Config, PathsConfig};
use crate::embedding::EmbeddingProvider;
use crate::extract::Extractor;
use crate::index::PassageIndex;
use crate::models::Passage;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::store::IndexStore;

/// Result of building one agent's index.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Built(BuildSummary),
    /// An index already exists and `force` was not set.
    Skipped { reason: String },
    Failed { reason: String },
}

impl BuildOutcome {
    /// Built and skipped both leave a usable index behind.
    pub fn is_success(&self) -> bool {
        !matches!(self, BuildOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildSummary {
    pub agent: String,
    pub documents: usize,
    pub skipped_files: Vec<PathBuf>,
    pub passages: usize,
    pub model_name: String,
    pub dims: usize,
    pub elapsed_ms: u128,
}

/// Passages gathered from one directory.
#[derive(Debug, Default)]
pub struct Ingested {
    pub passages: Vec<Passage>,
    pub documents: usize,
    /// Files that produced no text and were left out.
    pub skipped: Vec<PathBuf>,
}

/// Every PDF under `dir` matching the include globs and none of the
/// exclude globs, sorted for deterministic ordering.
pub fn discover_pdfs(dir: &Path, paths: &PathsConfig) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("PDF directory does not exist: {}", dir.display());
    }
    let include_set = build_globset(&paths.include_globs)?;
    let exclude_set = build_globset(&paths.exclude_globs)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(dir).unwrap_or(path);
        let rel_str = relative.to_string_lossy();
        if exclude_set.is_match(rel_str.as_ref()) || !include_set.is_match(rel_str.as_ref()) {
            continue;
        }
        files.push(path.to_path_buf());
    }
    files.sort();
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid glob pattern: {}", pattern))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Extract and chunk every PDF in `dir`. Files yielding no text are skipped.
pub fn ingest_directory(
    agent: &str,
    dir: &Path,
    paths: &PathsConfig,
    chunking: &ChunkingConfig,
    extractor: &Extractor,
    progress: &dyn BuildProgressReporter,
) -> Result<Ingested> {
    progress.report(BuildProgressEvent::Discovering {
        agent: agent.to_string(),
    });
    let files = discover_pdfs(dir, paths)?;
    let total = files.len() as u64;
    let done = AtomicU64::new(0);

    let per_file: Vec<(PathBuf, Vec<Passage>)> = files
        .par_iter()
        .map(|path| {
            let extraction = extractor.extract(path);
            let passages = if extraction.pages.is_empty() {
                Vec::new()
            } else {
                chunk_document(&extraction.pages, &extraction.metadata, chunking)
            };
            let n = done.fetch_add(1, Ordering::Relaxed) + 1;
            progress.report(BuildProgressEvent::Extracting {
                agent: agent.to_string(),
                n,
                total,
            });
            (path.clone(), passages)
        })
        .collect();

    let mut ingested = Ingested::default();
    for (path, passages) in per_file {
        if passages.is_empty() {
            warn!("{}: no usable text, skipping", path.display());
            ingested.skipped.push(path);
            continue;
        }
        ingested.documents += 1;
        ingested.passages.extend(passages);
    }
    Ok(ingested)
}

/// Build and persist an index for `agent` from the PDFs in `pdf_dir`,
/// replacing any existing index. Failures are reported in the outcome.
pub fn build_index(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    agent: &str,
    pdf_dir: &Path,
    progress: &dyn BuildProgressReporter,
) -> BuildOutcome {
    match try_build_index(config, provider, agent, pdf_dir, progress) {
        Ok(summary) => {
            info!(
                "{}: indexed {} passages from {} documents",
                agent, summary.passages, summary.documents
            );
            BuildOutcome::Built(summary)
        }
        Err(e) => {
            warn!("{}: build failed: {:#}", agent, e);
            BuildOutcome::Failed {
                reason: format!("{:#}", e),
            }
        }
    }
}

fn try_build_index(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    agent: &str,
    pdf_dir: &Path,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildSummary> {
    let started = Instant::now();
    let store = IndexStore::new(&config.paths.processed);
    let _lock = store.lock(agent)?;

    let extractor = Extractor::default();
    let ingested = ingest_directory(
        agent,
        pdf_dir,
        &config.paths,
        &config.chunking,
        &extractor,
        progress,
    )?;
    if ingested.documents == 0 {
        bail!("no PDFs with extractable text in {}", pdf_dir.display());
    }

    let documents = ingested.documents;
    let index = PassageIndex::build(
        agent,
        ingested.passages,
        provider,
        &config.chunking,
        config.embedding.batch_size,
        progress,
    )?;
    store.save(&index)?;

    Ok(BuildSummary {
        agent: agent.to_string(),
        documents,
        skipped_files: ingested.skipped,
        passages: index.len(),
        model_name: index.meta().model_name.clone(),
        dims: index.meta().dims,
        elapsed_ms: started.elapsed().as_millis(),
    })
}

/// Build one agent from its configured source directory. An existing index
/// is kept unless `force` is set.
pub fn build_agent(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    agent: &str,
    force: bool,
    progress: &dyn BuildProgressReporter,
) -> Result<BuildOutcome> {
    let agents = AgentSet::from_config(&config.agents);
    let Some(agent) = agents.resolve(agent) else {
        bail!(
            "Unknown agent: '{}'. Available: {}",
            agent,
            agents.names().join(", ")
        );
    };

    let store = IndexStore::new(&config.paths.processed);
    if !force && store.exists(agent) {
        info!("{}: index already exists, skipping (use --force to rebuild)", agent);
        return Ok(BuildOutcome::Skipped {
            reason: "index already exists".to_string(),
        });
    }

    let pdf_dir = config.paths.agent_pdf_dir(agent);
    Ok(build_index(config, provider, agent, &pdf_dir, progress))
}

/// Build every configured agent, one after another.
pub fn build_all(
    config: &Config,
    provider: &dyn EmbeddingProvider,
    force: bool,
    progress: &dyn BuildProgressReporter,
) -> Vec<(String, BuildOutcome)> {
    config
        .agents
        .names
        .iter()
        .map(|agent| {
            let outcome = build_agent(config, provider, agent, force, progress).unwrap_or_else(|e| {
                BuildOutcome::Failed {
                    reason: format!("{:#}", e),
                }
            });
            (agent.clone(), outcome)
        })
        .collect()
}

/// Copy PDFs into an agent's source directory. Missing files and non-PDFs
/// are skipped with a warning. Returns the destination paths written.
pub fn add_pdfs(config: &Config, agent: &str, files: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let agents = AgentSet::from_config(&config.agents);
    let Some(agent) = agents.resolve(agent) else {
        bail!("Unknown agent: '{}'", agent);
    };
    let dest_dir = config.paths.agent_pdf_dir(agent);
    std::fs::create_dir_all(&dest_dir)
        .with_context(|| format!("Failed to create {}", dest_dir.display()))?;

    let mut copied = Vec::new();
    for src in files {
        if !src.is_file() {
            warn!("{}: not found, skipping", src.display());
            continue;
        }
        let is_pdf = src
            .extension()
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        let Some(name) = src.file_name().filter(|_| is_pdf) else {
            warn!("{}: not a PDF, skipping", src.display());
            continue;
        };
        let dest = dest_dir.join(name);
        std::fs::copy(src, &dest)
            .with_context(|| format!("Failed to copy {} to {}", src.display(), dest.display()))?;
        info!("{}: added {}", agent, dest.display());
        copied.push(dest);
    }
    Ok(copied)
}

/// Remove an agent's index and any leftover build lock. Source PDFs are
/// left untouched.
pub fn cleanup_agent(config: &Config, agent: &str) -> Result<bool> {
    let agents = AgentSet::from_config(&config.agents);
    let Some(agent) = agents.resolve(agent) else {
        bail!("Unknown agent: '{}'", agent);
    };
    let removed = IndexStore::new(&config.paths.processed).remove(agent)?;
    if removed {
        info!("{}: removed index", agent);
    }
    Ok(removed)
}

/// Create the source and processed directories for every agent.
pub fn init_dirs(config: &Config) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();
    for agent in &config.agents.names {
        let dir = config.paths.agent_pdf_dir(agent);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        created.push(dir);
    }
    std::fs::create_dir_all(&config.paths.processed)
        .with_context(|| format!("Failed to create {}", config.paths.processed.display()))?;
    created.push(config.paths.processed.clone());
    Ok(created)
}
