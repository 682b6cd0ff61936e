//! Embedding backend trait and implementations.
//!
//! The [`Embedder`] trait abstracts over different inference engines so
//! callers don't couple to a specific model runtime. Backends:
//!
//! - [`NoOpEmbedder`] — zero vectors, always available
//! - [`HashEmbedder`] — deterministic bag-of-tokens vectors, no model needed
//! - `FastEmbedder` — fast native ONNX inference, feature = `fastembed`

use crate::Embedding;
use thiserror::Error;

/// Errors originating from the embedding backend.
#[derive(Debug, Clone, Error)]
#[error("embed: {message}")]
pub struct EmbedError {
    pub message: String,
}

impl EmbedError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

/// Portable embedding contract shared by every backend.
///
/// Calls may take arbitrarily long on remote or model-backed
/// implementations; any timeout belongs inside the backend, surfacing as an
/// [`EmbedError`]. Implementations must be deterministic for identical
/// input within one process run.
pub trait Embedder: Send + Sync {
    /// Embed a batch of text passages, returning one vector per input.
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError>;

    /// Dimensionality of the vectors this backend produces.
    fn dimension(&self) -> usize;

    /// Human-readable model identifier (e.g. "bge-small-en-v1.5").
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// NoOpEmbedder — always available, useful for tests and offline pipelines
// ---------------------------------------------------------------------------

/// Returns zero-vectors. Useful for exercising the pipeline without
/// downloading model weights; zero vectors never clear any similarity
/// threshold, so no `similar_to` edges are produced.
#[derive(Debug, Default, Clone)]
pub struct NoOpEmbedder {
    dim: usize,
}

impl NoOpEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Embedder for NoOpEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError> {
        Ok(texts.iter().map(|_| vec![0.0; self.dim]).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "noop"
    }
}

// ---------------------------------------------------------------------------
// HashEmbedder — deterministic, model-free
// ---------------------------------------------------------------------------

/// Bag-of-tokens feature hashing: every token is hashed into a bucket and
/// the resulting count vector is L2-normalized.
///
/// Texts sharing vocabulary score high under cosine similarity, identical
/// texts score 1.0, and the same input always yields the same vector, which
/// makes this the default backend for reproducible offline builds.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1) }
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut vector = vec![0.0f32; self.dim];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| !t.is_empty());
        for token in tokens {
            let digest = blake3::hash(token.to_ascii_lowercase().as_bytes());
            let mut eight = [0u8; 8];
            eight.copy_from_slice(&digest.as_bytes()[..8]);
            let bucket = (u64::from_le_bytes(eight) % self.dim as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Embedder for HashEmbedder {
    fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        "hash-bow"
    }
}

// ---------------------------------------------------------------------------
// FastEmbedder — native-only, feature = "fastembed"
// ---------------------------------------------------------------------------

#[cfg(feature = "fastembed")]
pub use self::fastembed_backend::FastEmbedder;

#[cfg(feature = "fastembed")]
mod fastembed_backend {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Wraps `fastembed::TextEmbedding` behind the [`Embedder`] trait.
    ///
    /// `TextEmbedding::embed` takes `&mut self`, so we use interior
    /// mutability via `Mutex` to keep the `Embedder` trait `&self`-safe
    /// (required for `Arc`).
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
        model_name: String,
        dim: usize,
    }

    impl FastEmbedder {
        /// Initialise with the default BGE-Small model (384-d, ~33 MB).
        pub fn default_model() -> Result<Self, EmbedError> {
            Self::with_model(EmbeddingModel::BGESmallENV15)
        }

        /// Initialise with a specific fastembed model variant.
        pub fn with_model(model_id: EmbeddingModel) -> Result<Self, EmbedError> {
            let info = TextEmbedding::list_supported_models()
                .into_iter()
                .find(|m| m.model == model_id);

            let dim = info.as_ref().map(|m| m.dim).unwrap_or(384);
            let name = info
                .as_ref()
                .map(|m| m.model_code.clone())
                .unwrap_or_else(|| "unknown".to_string());

            let opts = InitOptions::new(model_id).with_show_download_progress(true);

            let model = TextEmbedding::try_new(opts)
                .map_err(|e| EmbedError::new(format!("fastembed init: {}", e)))?;

            Ok(Self {
                model: Mutex::new(model),
                model_name: name,
                dim,
            })
        }
    }

    impl Embedder for FastEmbedder {
        fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError> {
            let owned: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
            let mut model = self
                .model
                .lock()
                .map_err(|e| EmbedError::new(format!("fastembed lock poisoned: {}", e)))?;
            model
                .embed(owned, None)
                .map_err(|e| EmbedError::new(format!("fastembed embed: {}", e)))
        }

        fn dimension(&self) -> usize {
            self.dim
        }

        fn model_name(&self) -> &str {
            &self.model_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_produces_zero_vectors() {
        let embedder = NoOpEmbedder::new(4);
        let out = embedder.embed(&["anything"]).unwrap();
        assert_eq!(out, vec![vec![0.0; 4]]);
    }

    #[test]
    fn test_hash_embedder_is_deterministic() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed(&["serialize object to json"]).unwrap();
        let b = embedder.embed(&["serialize object to json"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_hash_embedder_normalizes() {
        let embedder = HashEmbedder::new(32);
        let out = embedder.embed(&["convert dict to json string"]).unwrap();
        let norm: f32 = out[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hash_embedder_empty_text_is_zero() {
        let embedder = HashEmbedder::new(8);
        let out = embedder.embed(&[""]).unwrap();
        assert_eq!(out[0], vec![0.0; 8]);
    }

    #[test]
    fn test_hash_embedder_shared_vocabulary_scores_higher() {
        let embedder = HashEmbedder::new(64);
        let out = embedder
            .embed(&[
                "serialize the user record to json",
                "serialize the user record to json text",
                "walk the directory tree",
            ])
            .unwrap();
        let cos = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        assert!(cos(&out[0], &out[1]) > cos(&out[0], &out[2]));
    }
}
