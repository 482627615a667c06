//! In-memory passage index for one agent.
//!
//! Holds the ordered passage list, a row-major matrix of L2-normalized
//! vectors (one row per passage), and the [`IndexMeta`] recorded at build
//! time. Similarity is the inner product of normalized vectors, i.e. cosine.
//!
//! Indexes are built once, persisted by [`crate::store::IndexStore`], and
//! never mutated afterwards; queries share them through `Arc`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::config::ChunkingConfig;
use crate::embedding::{dot, l2_normalize, EmbeddingProvider};
use crate::error::IndexError;
use crate::models::Passage;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};

/// Bumped when the on-disk layout changes.
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Build metadata persisted as `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub format_version: u32,
    pub agent: String,
    pub model_name: String,
    pub dims: usize,
    pub passage_count: usize,
    pub document_count: usize,
    pub built_at: DateTime<Utc>,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// SHA-256 over the ordered passage hashes.
    pub corpus_hash: String,
}

/// Summary statistics for a loaded index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub passage_count: usize,
    pub document_count: usize,
    pub model_name: String,
    pub dims: usize,
    pub built_at: DateTime<Utc>,
    pub avg_passage_chars: f64,
    pub min_passage_chars: usize,
    pub max_passage_chars: usize,
}

/// One search hit, borrowing the passage from its index.
#[derive(Debug, Clone, Copy)]
pub struct ScoredPassage<'a> {
    pub passage: &'a Passage,
    pub similarity: f32,
}

#[derive(Debug)]
pub struct PassageIndex {
    meta: IndexMeta,
    passages: Vec<Passage>,
    vectors: Vec<f32>,
}

impl PassageIndex {
    /// Embed `passages` in batches and assemble an index.
    ///
    /// Fails on an empty corpus, on any embedding error, or when the
    /// provider returns a vector whose length differs from its `dims()`.
    pub fn build(
        agent: &str,
        passages: Vec<Passage>,
        provider: &dyn EmbeddingProvider,
        chunking: &ChunkingConfig,
        batch_size: usize,
        progress: &dyn BuildProgressReporter,
    ) -> Result<Self, IndexError> {
        if passages.is_empty() {
            return Err(IndexError::EmptyCorpus);
        }
        let dims = provider.dims();
        if dims == 0 {
            return Err(IndexError::Embedding(format!(
                "provider '{}' reports zero dimensions",
                provider.model_name()
            )));
        }

        let total = passages.len() as u64;
        let mut vectors = Vec::with_capacity(passages.len() * dims);
        let mut done = 0u64;
        for batch in passages.chunks(batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();
            let embedded = provider
                .embed(&texts)
                .map_err(|e| IndexError::Embedding(format!("{:#}", e)))?;
            if embedded.len() != texts.len() {
                return Err(IndexError::Embedding(format!(
                    "provider returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                )));
            }
            for mut v in embedded {
                if v.len() != dims {
                    return Err(IndexError::DimensionMismatch {
                        expected: dims,
                        actual: v.len(),
                    });
                }
                l2_normalize(&mut v);
                vectors.extend_from_slice(&v);
            }
            done += batch.len() as u64;
            progress.report(BuildProgressEvent::Embedding {
                agent: agent.to_string(),
                n: done,
                total,
            });
        }

        let meta = IndexMeta {
            format_version: INDEX_FORMAT_VERSION,
            agent: agent.to_string(),
            model_name: provider.model_name().to_string(),
            dims,
            passage_count: passages.len(),
            document_count: count_documents(&passages),
            built_at: Utc::now(),
            chunk_size: chunking.chunk_size,
            chunk_overlap: chunking.chunk_overlap,
            corpus_hash: corpus_hash(&passages),
        };

        Ok(Self {
            meta,
            passages,
            vectors,
        })
    }

    /// Reassemble an index from persisted parts, validating them against
    /// each other.
    pub fn from_parts(
        meta: IndexMeta,
        passages: Vec<Passage>,
        vectors: Vec<f32>,
    ) -> Result<Self, IndexError> {
        if meta.format_version != INDEX_FORMAT_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported format version {}",
                meta.format_version
            )));
        }
        if meta.dims == 0 {
            return Err(IndexError::Corrupt("zero dimensions".to_string()));
        }
        if passages.len() != meta.passage_count {
            return Err(IndexError::Corrupt(format!(
                "meta lists {} passages but {} were stored",
                meta.passage_count,
                passages.len()
            )));
        }
        if vectors.len() != meta.passage_count * meta.dims {
            return Err(IndexError::Corrupt(format!(
                "expected {} x {} vector values, found {}",
                meta.passage_count,
                meta.dims,
                vectors.len()
            )));
        }
        Ok(Self {
            meta,
            passages,
            vectors,
        })
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn vectors(&self) -> &[f32] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Whether `provider` produces vectors comparable with this index.
    pub fn check_compatible(&self, provider: &dyn EmbeddingProvider) -> Result<(), IndexError> {
        if provider.model_name() != self.meta.model_name || provider.dims() != self.meta.dims {
            return Err(IndexError::ModelMismatch {
                index_model: self.meta.model_name.clone(),
                index_dims: self.meta.dims,
                provider_model: provider.model_name().to_string(),
                provider_dims: provider.dims(),
            });
        }
        Ok(())
    }

    /// Embed `query` with `provider` and search.
    pub fn search(
        &self,
        provider: &dyn EmbeddingProvider,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<ScoredPassage<'_>>, IndexError> {
        self.check_compatible(provider)?;
        let mut q = crate::embedding::embed_query(provider, query)
            .map_err(|e| IndexError::Embedding(format!("{:#}", e)))?;
        if q.len() != self.meta.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.meta.dims,
                actual: q.len(),
            });
        }
        l2_normalize(&mut q);
        Ok(self.search_vector(&q, top_k, min_similarity))
    }

    /// Rank passages against an already-normalized query vector.
    ///
    /// Returns at most `top_k` hits with similarity in `[min_similarity, 1.0]`,
    /// highest first; equal scores keep ingestion order.
    pub fn search_vector(
        &self,
        query: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<ScoredPassage<'_>> {
        if top_k == 0 || query.len() != self.meta.dims {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.meta.dims)
            .enumerate()
            .map(|(i, row)| (i, dot(row, query).min(1.0)))
            .filter(|(_, sim)| *sim >= min_similarity)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .map(|(i, similarity)| ScoredPassage {
                passage: &self.passages[i],
                similarity,
            })
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let lengths: Vec<usize> = self.passages.iter().map(|p| p.char_count).collect();
        let total: usize = lengths.iter().sum();
        IndexStats {
            passage_count: self.meta.passage_count,
            document_count: self.meta.document_count,
            model_name: self.meta.model_name.clone(),
            dims: self.meta.dims,
            built_at: self.meta.built_at,
            avg_passage_chars: if lengths.is_empty() {
                0.0
            } else {
                total as f64 / lengths.len() as f64
            },
            min_passage_chars: lengths.iter().copied().min().unwrap_or(0),
            max_passage_chars: lengths.iter().copied().max().unwrap_or(0),
        }
    }
}

fn count_documents(passages: &[Passage]) -> usize {
    passages
        .iter()
        .map(|p| p.document.filepath.as_str())
        .collect::<BTreeSet<_>>()
        .len()
}

fn corpus_hash(passages: &[Passage]) -> String {
    let mut hasher = Sha256::new();
    for p in passages {
        hasher.update(p.hash.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
