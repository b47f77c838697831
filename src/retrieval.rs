//! # Retrieval service
//!
//! Answers a query with the most relevant stored documents:
//! embed the query, search the [`VectorIndex`], map positions back to
//! [`MetadataStore`] entries, and return the texts nearest first.
//!
//! The service is built once at process start and then shared read-only
//! (behind an `Arc` or a plain reference) by every request handler.
//!
//! ## States
//! - [`ServiceState::Ready`]: model, index and metadata all loaded and the
//!   model width matches the index width.
//! - [`ServiceState::Degraded`]: something failed at startup. Every search
//!   answers with an empty list. There is no retry; restart the process to
//!   pick up a fixed snapshot.
//!
//! ## Failure policy
//! [`RetrievalService::search`] never returns an error. Lower-level failures
//! are logged and become an empty result, so a conversational caller can
//! always carry on without retrieved context. Callers that need to tell
//! "nothing relevant" from "retrieval is down" use
//! [`RetrievalService::retrieve`] instead.
//!
//! ## Quick Example
//! ```no_run
//! use awful_rag::config::RagConfig;
//! use awful_rag::retrieval::RetrievalService;
//!
//! let service = RetrievalService::load(&RagConfig::default());
//! for doc in service.search("fruit dessert", 3) {
//!     println!("{doc}");
//! }
//! ```

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::{ModelConfig, RagConfig};
use crate::embedding::{Embedder, SentenceEmbeddingsModel};
use crate::error::{LoadError, SearchError};
use crate::metadata::MetadataStore;
use crate::vector_index::VectorIndex;

/// Whether the service can answer queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Ready,
    Degraded,
}

/// Outcome of one retrieval, for callers that care why it may be empty.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Search ran; zero or more documents, nearest first.
    Documents(Vec<String>),
    /// The service is degraded; nothing was searched.
    Unavailable,
    /// Search ran but failed for this query (already logged).
    Failed,
}

impl Retrieval {
    /// Collapse to a plain document list, empty unless documents were found.
    pub fn into_documents(self) -> Vec<String> {
        match self {
            Retrieval::Documents(docs) => docs,
            Retrieval::Unavailable | Retrieval::Failed => Vec::new(),
        }
    }
}

struct Components {
    embedder: Box<dyn Embedder>,
    index: VectorIndex,
    metadata: MetadataStore,
}

enum Inner {
    Ready(Components),
    Degraded(LoadError),
}

/// Query → ranked documents, over immutable components loaded at startup.
pub struct RetrievalService {
    inner: Inner,
    default_k: usize,
    max_k: usize,
}

impl RetrievalService {
    /// Load the MiniLM model, the index and the metadata named in `config`.
    ///
    /// Never fails: any load error is logged once and yields a degraded service.
    pub fn load(config: &RagConfig) -> Self {
        Self::load_with(config, |model: &ModelConfig| {
            SentenceEmbeddingsModel::load(model).map(|m| Box::new(m) as Box<dyn Embedder>)
        })
    }

    /// Like [`load`](Self::load) with an injected embedding model loader.
    pub fn load_with<F>(config: &RagConfig, load_model: F) -> Self
    where
        F: FnOnce(&ModelConfig) -> Result<Box<dyn Embedder>, LoadError>,
    {
        let started = Instant::now();
        info!("Attempting to load retrieval components...");

        let loaded = load_model(&config.model).and_then(|embedder| {
            let index = VectorIndex::load(&config.index_path)?;
            let metadata = MetadataStore::load(&config.metadata_path)?;
            Ok((embedder, index, metadata))
        });

        let service = match loaded {
            Ok((embedder, index, metadata)) => Self::from_components(embedder, index, metadata),
            Err(e) => Self::degraded(e),
        };

        if service.is_ready() {
            info!(
                "All retrieval components loaded successfully in {:.2} seconds.",
                started.elapsed().as_secs_f32()
            );
        }
        service.with_limits(config.default_k, config.max_k)
    }

    /// Assemble a service from already loaded parts, checking they fit together.
    ///
    /// - embedder width ≠ index width: degraded (similarities would be meaningless)
    /// - embedder model ≠ snapshot model: warning only
    /// - index count ≠ metadata length: warning only; positions past the
    ///   shorter of the two are never read
    pub fn from_components(
        embedder: Box<dyn Embedder>,
        index: VectorIndex,
        metadata: MetadataStore,
    ) -> Self {
        if embedder.dimension() != index.dimension() {
            return Self::degraded(LoadError::DimensionMismatch {
                model: embedder.model_name().to_string(),
                model_dimension: embedder.dimension(),
                index_dimension: index.dimension(),
            });
        }
        if embedder.model_name() != index.model() {
            warn!(
                "Embedding model '{}' differs from the model the index was built with ('{}'). Similarity scores may be meaningless.",
                embedder.model_name(),
                index.model()
            );
        }
        if metadata.len() != index.count() {
            warn!(
                "Metadata length ({}) does not match vector index size ({}). Check index/metadata consistency.",
                metadata.len(),
                index.count()
            );
        }

        let defaults = RagConfig::default();
        Self {
            inner: Inner::Ready(Components {
                embedder,
                index,
                metadata,
            }),
            default_k: defaults.default_k,
            max_k: defaults.max_k,
        }
    }

    /// A service that answers every query with nothing.
    pub fn degraded(reason: LoadError) -> Self {
        error!("CRITICAL: {}. Retrieval will be disabled.", reason);
        let defaults = RagConfig::default();
        Self {
            inner: Inner::Degraded(reason),
            default_k: defaults.default_k,
            max_k: defaults.max_k,
        }
    }

    /// Override the default and maximum result counts.
    pub fn with_limits(mut self, default_k: usize, max_k: usize) -> Self {
        self.default_k = default_k;
        self.max_k = max_k;
        self
    }

    pub fn state(&self) -> ServiceState {
        match self.inner {
            Inner::Ready(_) => ServiceState::Ready,
            Inner::Degraded(_) => ServiceState::Degraded,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ServiceState::Ready
    }

    /// Why the service is degraded, if it is.
    pub fn degraded_reason(&self) -> Option<&LoadError> {
        match &self.inner {
            Inner::Ready(_) => None,
            Inner::Degraded(reason) => Some(reason),
        }
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    /// Up to `k` documents relevant to `query`, most relevant first.
    ///
    /// Returns an empty list for blank queries, `k == 0`, a degraded service,
    /// or any per-query failure.
    pub fn search(&self, query: &str, k: usize) -> Vec<String> {
        self.retrieve(query, k).into_documents()
    }

    /// [`search`](Self::search) with the configured default `k`.
    pub fn search_default(&self, query: &str) -> Vec<String> {
        self.search(query, self.default_k)
    }

    /// Search, keeping the reason an empty answer is empty.
    pub fn retrieve(&self, query: &str, k: usize) -> Retrieval {
        let components = match &self.inner {
            Inner::Ready(components) => components,
            Inner::Degraded(_) => {
                warn!("Search called but retrieval components are not loaded. Returning empty list.");
                return Retrieval::Unavailable;
            }
        };

        if query.trim().is_empty() {
            warn!("Search query is empty or invalid. Returning empty list.");
            return Retrieval::Documents(Vec::new());
        }
        if k == 0 {
            return Retrieval::Documents(Vec::new());
        }
        let k = if k > self.max_k {
            debug!("Clamping k={} to max_k={}", k, self.max_k);
            self.max_k
        } else {
            k
        };

        debug!("Performing retrieval for query: '{}', k={}", preview(query, 100), k);

        match components.search(query, k) {
            Ok(docs) => {
                info!(
                    "Retrieval found {} documents for query: '{}'",
                    docs.len(),
                    preview(query, 50)
                );
                Retrieval::Documents(docs)
            }
            Err(e) => {
                error!("Error during retrieval for query '{}': {}", preview(query, 50), e);
                Retrieval::Failed
            }
        }
    }

    /// Run [`search`](Self::search) on the tokio blocking pool.
    ///
    /// Embedding is CPU-bound; async hosts should not run it on a worker thread.
    pub async fn search_async(self: Arc<Self>, query: String, k: usize) -> Vec<String> {
        match tokio::task::spawn_blocking(move || self.search(&query, k)).await {
            Ok(docs) => docs,
            Err(e) => {
                error!("Retrieval task failed: {}", e);
                Vec::new()
            }
        }
    }
}

impl Components {
    fn search(&self, query: &str, k: usize) -> Result<Vec<String>, SearchError> {
        let vector = self.embedder.embed(query)?;
        let neighbors = self.index.search(&vector, k)?;

        let mut results = Vec::with_capacity(k);
        for neighbor in neighbors {
            let Some(position) = neighbor.position else {
                debug!("Index returned no-match marker; fewer than k results available.");
                continue;
            };
            match self.metadata.get(position) {
                Some(doc) => results.push(doc.to_string()),
                None => warn!(
                    "Retrieved position {} is out of bounds for metadata (size {}). Skipping.",
                    position,
                    self.metadata.len()
                ),
            }
        }
        Ok(results)
    }
}

/// First `max` characters of `text`, for log lines.
fn preview(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}
