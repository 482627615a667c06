//! Typed errors for extraction and index operations.
//!
//! Orchestration code (CLI, ingestion, server) wraps these in
//! `anyhow::Error` with context; the retriever logs them and degrades to
//! empty results.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::ExtractionMethod;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{method} extraction failed: {message}")]
    Strategy {
        method: ExtractionMethod,
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("no passages to index")]
    EmptyCorpus,

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error(
        "index was built with {index_model} ({index_dims} dims) but the provider is \
         {provider_model} ({provider_dims} dims); rebuild the index"
    )]
    ModelMismatch {
        index_model: String,
        index_dims: usize,
        provider_model: String,
        provider_dims: usize,
    },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("missing index artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("corrupt index: {0}")]
    Corrupt(String),

    #[error(
        "a build for agent '{agent}' is already in progress (lock file {}; \
         run `kb cleanup {agent}` if no build is running)",
        .lock.display()
    )]
    BuildInProgress { agent: String, lock: PathBuf },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl IndexError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IndexError::Io {
            path: path.into(),
            source,
        }
    }
}
