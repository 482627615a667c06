//! Deterministic feature-hashing embedder.
//!
//! Lowercased alphanumeric tokens and adjacent-token bigrams are hashed
//! with SHA-256 into `dims` buckets with a hash-derived sign. Texts sharing
//! vocabulary land close together under cosine similarity; no model files
//! or network access are needed, which makes it suitable for tests and
//! air-gapped installs.

use anyhow::Result;
use sha2::{Digest, Sha256};

use super::EmbeddingProvider;

const BIGRAM_WEIGHT: f32 = 0.5;

pub struct HashingProvider {
    dims: usize,
    model_name: String,
}

impl HashingProvider {
    pub const DEFAULT_DIMS: usize = 512;

    pub fn new(dims: usize) -> Self {
        Self {
            dims: dims.max(1),
            model_name: "feature-hash-v1".to_string(),
        }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();

        for token in &tokens {
            self.add_feature(&mut v, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut v, bigram.as_bytes(), BIGRAM_WEIGHT);
        }
        v
    }

    fn add_feature(&self, v: &mut [f32], feature: &[u8], weight: f32) {
        let digest = Sha256::digest(feature);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        let h = u64::from_le_bytes(head);
        let bucket = (h % self.dims as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        v[bucket] += sign * weight;
    }
}

impl EmbeddingProvider for HashingProvider {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}
