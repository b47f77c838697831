//! # Embedding model
//!
//! Sentence embeddings for queries, computed with Candle (pure Rust ML framework).
//!
//! The [`Embedder`] trait is the seam the rest of the crate depends on; the
//! production implementation is [`SentenceEmbeddingsModel`], a BERT encoder
//! (all-MiniLM-L6-v2 by default) with mean pooling and L2 normalization.
//!
//! The model **must** be the one the persisted index was built with. A
//! different model of the same width loads fine and answers every query, it
//! just answers them wrongly, so the model id recorded in the index snapshot
//! is compared against [`Embedder::model_name`] at startup.
//!
//! ## Model files
//! Weights are resolved from, in priority order:
//! 1. `model.local_dir` in the config (no network access at all), or
//! 2. the Hugging Face Hub cache, downloading on first use.
//!
//! ## Quick Example
//! ```no_run
//! use awful_rag::config::ModelConfig;
//! use awful_rag::embedding::{Embedder, SentenceEmbeddingsModel};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let model = SentenceEmbeddingsModel::load(&ModelConfig::default())?;
//! let v = model.embed("Rust is great!")?;
//! assert_eq!(v.len(), model.dimension());
//! # Ok(()) }
//! ```

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::ApiBuilder};
use rayon::prelude::*;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Instant;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use crate::config::ModelConfig;
use crate::error::{EmbedError, LoadError};

/// Fixed-width vector in the shared semantic space.
pub type EmbeddingVector = Vec<f32>;

/// Sentence-transformers truncate MiniLM inputs at 256 word pieces.
const MAX_SEQUENCE_LENGTH: usize = 256;

/// Maps text into the vector space of the persisted index.
///
/// Implementations are immutable after construction and shared across
/// concurrent queries, hence `Send + Sync`.
pub trait Embedder: Send + Sync {
    /// Identifier of the model (e.g. the Hugging Face repo id).
    fn model_name(&self) -> &str;

    /// Width of every vector returned by [`embed`](Self::embed).
    fn dimension(&self) -> usize;

    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbedError>;

    /// Embed several texts, preserving input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

// Only the field we need from a BERT `config.json`.
#[derive(Deserialize)]
struct HiddenSize {
    hidden_size: usize,
}

/// Sentence embeddings model using Candle (pure Rust)
pub struct SentenceEmbeddingsModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    name: String,
    dimension: usize,
}

impl SentenceEmbeddingsModel {
    /// Load the model from `local_dir` or the Hugging Face Hub.
    ///
    /// # Errors
    /// Returns [`LoadError::ModelLoad`] if any model file cannot be fetched,
    /// read or parsed, or if the weights do not fit the BERT config.
    pub fn load(config: &ModelConfig) -> Result<Self, LoadError> {
        let started = Instant::now();
        info!("Loading embedding model: {}...", config.model_id);

        let (config_file, tokenizer_file, weights_file) = resolve_model_files(config)?;
        let fail = |e: String| LoadError::model(&config.model_id, e);

        // Load config
        let raw = std::fs::read_to_string(&config_file).map_err(|e| fail(e.to_string()))?;
        let bert_config: Config = serde_json::from_str(&raw).map_err(|e| fail(e.to_string()))?;
        let HiddenSize { hidden_size } = serde_json::from_str(&raw).map_err(|e| fail(e.to_string()))?;

        // Load tokenizer
        let mut tokenizer = Tokenizer::from_file(&tokenizer_file).map_err(|e| fail(e.to_string()))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| fail(e.to_string()))?;

        // Load weights
        let device = Device::Cpu;
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_file], DTYPE, &device) }
            .map_err(|e| fail(e.to_string()))?;
        let model = BertModel::load(vb, &bert_config).map_err(|e| fail(e.to_string()))?;

        info!(
            "Embedding model '{}' loaded in {:.2}s ({}-d).",
            config.model_id,
            started.elapsed().as_secs_f32(),
            hidden_size
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            name: config.model_id.clone(),
            dimension: hidden_size,
        })
    }

    /// Mean pooling over token embeddings, considering attention mask
    fn mean_pooling(&self, embeddings: &Tensor, attention_mask: &[u32]) -> Result<Tensor, EmbedError> {
        // embeddings: [1, seq_len, hidden]; mask becomes [1, seq_len, 1]
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?;

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;

        Ok(sum.broadcast_div(&count)?.squeeze(0)?)
    }

    /// L2 normalize the embedding vector
    fn normalize(&self, tensor: &Tensor) -> Result<Tensor, EmbedError> {
        let norm = tensor.sqr()?.sum_all()?.sqrt()?;
        Ok(tensor.broadcast_div(&norm)?)
    }
}

impl Embedder for SentenceEmbeddingsModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbedError::Tokenize(e.to_string()))?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;
        let embedding = self.mean_pooling(&output, tokens.get_attention_mask())?;
        let embedding = self.normalize(&embedding)?.to_vec1::<f32>()?;

        if embedding.len() != self.dimension {
            return Err(EmbedError::Width {
                expected: self.dimension,
                got: embedding.len(),
            });
        }
        debug!("Embedded {} tokens", tokens.get_ids().len());
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>, EmbedError> {
        texts.par_iter().map(|text| self.embed(text)).collect()
    }
}

/// Locate `config.json`, `tokenizer.json` and `model.safetensors`.
fn resolve_model_files(config: &ModelConfig) -> Result<(PathBuf, PathBuf, PathBuf), LoadError> {
    const FILES: [&str; 3] = ["config.json", "tokenizer.json", "model.safetensors"];

    if let Some(dir) = &config.local_dir {
        debug!("Resolving model files from {}", dir.display());
        let [c, t, w] = FILES.map(|f| dir.join(f));
        for path in [&c, &t, &w] {
            if !path.is_file() {
                return Err(LoadError::model(
                    &config.model_id,
                    format!("missing model file {}", path.display()),
                ));
            }
        }
        return Ok((c, t, w));
    }

    let mut builder = ApiBuilder::new().with_progress(false);
    if let Some(cache) = &config.cache_dir {
        builder = builder.with_cache_dir(cache.clone());
    }
    let api = builder
        .build()
        .map_err(|e| LoadError::model(&config.model_id, e))?;
    let repo = api.repo(Repo::with_revision(
        config.model_id.clone(),
        RepoType::Model,
        config.revision.clone(),
    ));

    let fetch = |name: &str| {
        repo.get(name)
            .map_err(|e| LoadError::model(&config.model_id, format!("{name}: {e}")))
    };
    Ok((fetch(FILES[0])?, fetch(FILES[1])?, fetch(FILES[2])?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeywordEmbedder;

    #[test]
    fn test_missing_local_dir_is_a_model_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            local_dir: Some(dir.path().to_path_buf()),
            ..ModelConfig::default()
        };

        let err = SentenceEmbeddingsModel::load(&config).err().unwrap();
        assert!(matches!(err, LoadError::ModelLoad { .. }));
        assert!(err.to_string().contains("config.json"));
    }

    #[test]
    fn test_default_embed_batch_preserves_order() {
        let embedder = KeywordEmbedder::new();
        let batch = embedder.embed_batch(&["car engine", "apple pie"]).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("car engine").unwrap());
        assert_eq!(batch[1], embedder.embed("apple pie").unwrap());
    }

    #[test]
    #[ignore = "downloads all-MiniLM-L6-v2 from the Hugging Face Hub"]
    fn test_minilm_embeds_to_unit_vectors() {
        let model = SentenceEmbeddingsModel::load(&ModelConfig::default()).unwrap();
        let v = model.embed("Rust is cool.").unwrap();
        assert_eq!(v.len(), 384);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }
}
