//! # Errors
//!
//! Typed failures for every layer of the retrieval stack.
//!
//! - [`LoadError`] covers startup: the embedding model, the vector index, the
//!   metadata file, and the alignment between model and index. Any of these
//!   puts the [`RetrievalService`](crate::retrieval::RetrievalService) into its
//!   degraded state for the rest of the process lifetime.
//! - [`EmbedError`] and [`IndexError`] are per-call failures of the two leaf
//!   components. [`SearchError`] wraps them for a single query.
//!
//! None of these escape [`RetrievalService::search`](crate::retrieval::RetrievalService::search);
//! they are logged there and turned into an empty result.

use std::path::PathBuf;

/// Startup failures. Each one is fatal to the retrieval service, never per-query.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to load embedding model '{model}': {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("failed to load vector index from {}: {reason}", path.display())]
    IndexLoad { path: PathBuf, reason: String },

    #[error("failed to load metadata from {}: {reason}", path.display())]
    MetadataLoad { path: PathBuf, reason: String },

    #[error("embedding dimension mismatch: model '{model}' produces {model_dimension}, index expects {index_dimension}")]
    DimensionMismatch {
        model: String,
        model_dimension: usize,
        index_dimension: usize,
    },
}

impl LoadError {
    pub(crate) fn model(model: &str, reason: impl ToString) -> Self {
        LoadError::ModelLoad {
            model: model.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn index(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LoadError::IndexLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn metadata(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LoadError::MetadataLoad {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

/// Failures while turning text into an embedding.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("tokenization error: {0}")]
    Tokenize(String),

    #[error("model inference error: {0}")]
    Inference(#[from] candle_core::Error),

    #[error("model produced a {got}-d embedding, expected {expected}")]
    Width { expected: usize, got: usize },
}

/// Failures of a single nearest-neighbor query.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("query dimension mismatch: index expects {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Everything that can go wrong for one query once the service is ready.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error(transparent)]
    Embed(#[from] EmbedError),

    #[error(transparent)]
    Index(#[from] IndexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_messages_name_the_file() {
        let err = LoadError::index("rag_index/index.bin", "file not found");
        let msg = err.to_string();
        assert!(msg.contains("rag_index/index.bin"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let err = LoadError::DimensionMismatch {
            model: "mini".into(),
            model_dimension: 384,
            index_dimension: 768,
        };
        assert!(err.to_string().contains("384"));
        assert!(err.to_string().contains("768"));
    }
}
