//! Offline fixtures shared by the unit tests.

use std::path::PathBuf;
use tempfile::TempDir;

use crate::config::{ModelConfig, RagConfig};
use crate::embedding::{Embedder, EmbeddingVector};
use crate::error::EmbedError;
use crate::metadata::MetadataStore;
use crate::vector_index::{IndexKind, IndexSnapshot};

pub const KEYWORD_MODEL: &str = "test/keyword-embedder";

// Topic axes: food, vehicles, weather, everything else.
const TOPICS: [&[&str]; 3] = [
    &["apple", "pie", "banana", "bread", "fruit", "dessert", "cake"],
    &["car", "engine", "wheel", "truck", "motor"],
    &["rain", "snow", "storm", "sunny"],
];

/// Deterministic bag-of-topics embedder standing in for MiniLM.
pub struct KeywordEmbedder {
    name: String,
    dimension: usize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self::with_dimension(4)
    }

    /// Extra dimensions stay zero; only used to build mismatched setups.
    pub fn with_dimension(dimension: usize) -> Self {
        assert!(dimension >= TOPICS.len() + 1);
        Self {
            name: KEYWORD_MODEL.to_string(),
            dimension,
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbedError> {
        let mut v = vec![0.0f32; self.dimension];
        for word in text.split_whitespace().map(str::to_lowercase) {
            let axis = TOPICS
                .iter()
                .position(|topic| topic.contains(&word.as_str()))
                .unwrap_or(TOPICS.len());
            v[axis] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}

/// Index + metadata files on disk, plus a config pointing at them.
pub struct Fixture {
    pub dir: TempDir,
    pub config: RagConfig,
}

impl Fixture {
    /// Embed `index_docs` into a snapshot and write `metadata_docs` beside it.
    pub fn new(kind: IndexKind, index_docs: &[&str], metadata_docs: &[&str]) -> Self {
        let embedder = KeywordEmbedder::new();
        let vectors = embedder.embed_batch(index_docs).unwrap();
        let snapshot = IndexSnapshot::new(kind, KEYWORD_MODEL, embedder.dimension(), vectors);
        Self::from_snapshot(&snapshot, metadata_docs)
    }

    pub fn aligned(docs: &[&str]) -> Self {
        Self::new(IndexKind::Flat, docs, docs)
    }

    pub fn from_snapshot(snapshot: &IndexSnapshot, metadata_docs: &[&str]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = RagConfig {
            index_path: dir.path().join("index.bin"),
            metadata_path: dir.path().join("metadata.json"),
            model: ModelConfig {
                model_id: KEYWORD_MODEL.to_string(),
                ..ModelConfig::default()
            },
            ..RagConfig::default()
        };
        snapshot.save(&config.index_path).unwrap();
        MetadataStore::new(metadata_docs.iter().map(|d| d.to_string()).collect())
            .save(&config.metadata_path)
            .unwrap();
        Self { dir, config }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

pub const SCENARIO_DOCS: [&str; 3] = ["apple pie", "car engine", "banana bread"];
