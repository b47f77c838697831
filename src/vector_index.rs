//! # Vector index
//!
//! Read-only nearest-neighbor index over the precomputed document embeddings.
//!
//! The index is loaded once from an [`IndexSnapshot`] file and never mutated
//! afterwards, so a single [`VectorIndex`] can serve concurrent queries
//! through `&self`.
//!
//! ## Serialization layout
//! The snapshot is `bincode` (standard config, capped at
//! [`MAX_SNAPSHOT_BYTES`]) over serde and records the
//! backend kind, the embedding model id, the vector width and the vectors in
//! position order. Position *i* of the index is vector *i* of the snapshot.
//!
//! ## Backends
//! - [`IndexKind::Flat`]: exact brute-force scan.
//! - [`IndexKind::Hnsw`]: a [HNSW](https://arxiv.org/abs/1603.09320) graph
//!   (`hora` crate) rebuilt from the vectors at load time, used to pick
//!   candidates.
//!
//! Both report squared Euclidean distances computed from the stored vectors,
//! ordered nearest first with ties broken by position.

use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{IndexError, LoadError};

/// Format tag written at the start of every snapshot.
pub const SNAPSHOT_FORMAT: &str = "awful-rag-index";
/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;
/// Largest snapshot file accepted, and the decoder's allocation ceiling.
pub const MAX_SNAPSHOT_BYTES: usize = 1 << 31;

/// Search structure used for the persisted vectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    Flat,
    Hnsw,
}

/// On-disk form of a vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub format: String,
    pub version: u32,
    pub kind: IndexKind,
    /// Embedding model the vectors were produced with.
    pub model: String,
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
}

impl IndexSnapshot {
    pub fn new(kind: IndexKind, model: impl Into<String>, dimension: usize, vectors: Vec<Vec<f32>>) -> Self {
        Self {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            kind,
            model: model.into(),
            dimension,
            vectors,
        }
    }

    /// Write the snapshot to `path`.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(std::io::Error::other)?;
        fs::write(path, bytes)
    }

    fn decode(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() > MAX_SNAPSHOT_BYTES {
            return Err(format!(
                "index snapshot is {} bytes, limit is {MAX_SNAPSHOT_BYTES}",
                bytes.len()
            ));
        }
        // The limit makes a bogus length prefix fail before it is allocated.
        let config = bincode::config::standard().with_limit::<MAX_SNAPSHOT_BYTES>();
        let (snapshot, read): (IndexSnapshot, usize) = bincode::serde::decode_from_slice(bytes, config)
            .map_err(|e| format!("corrupt index snapshot: {e}"))?;
        if read != bytes.len() {
            return Err(format!(
                "corrupt index snapshot: {} trailing bytes",
                bytes.len() - read
            ));
        }
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), String> {
        if self.format != SNAPSHOT_FORMAT {
            return Err(format!("not an index snapshot (format tag '{}')", self.format));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(format!("unsupported snapshot version {}", self.version));
        }
        if self.dimension == 0 {
            return Err("snapshot declares a zero vector dimension".to_string());
        }
        for (position, vector) in self.vectors.iter().enumerate() {
            if vector.len() != self.dimension {
                return Err(format!(
                    "vector {position} has {} components, expected {}",
                    vector.len(),
                    self.dimension
                ));
            }
            if vector.iter().any(|x| !x.is_finite()) {
                return Err(format!("vector {position} has non-finite components"));
            }
        }
        Ok(())
    }
}

/// One ranked search hit.
///
/// `position` is `None` for the padding entries returned when the index
/// holds fewer than `k` vectors; those sort last with an infinite distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub distance: f32,
    pub position: Option<usize>,
}

impl Neighbor {
    /// The "no match" marker.
    pub const NONE: Neighbor = Neighbor {
        distance: f32::INFINITY,
        position: None,
    };

    pub fn is_match(&self) -> bool {
        self.position.is_some()
    }

    fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.position.cmp(&b.position))
    }
}

/// Immutable nearest-neighbor index loaded from a snapshot.
pub struct VectorIndex {
    kind: IndexKind,
    model: String,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    hnsw: Option<HNSWIndex<f32, usize>>,
    fingerprint: String,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("dimension", &self.dimension)
            .field("count", &self.vectors.len())
            .field("fingerprint", &self.fingerprint)
            .finish()
    }
}

impl VectorIndex {
    /// Load and validate a snapshot file.
    ///
    /// # Errors
    /// [`LoadError::IndexLoad`] if the file is missing, unreadable, corrupt,
    /// or describes inconsistent vectors.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let started = Instant::now();
        info!("Loading vector index from: {}...", path.display());

        let size = fs::metadata(path).map_err(|e| LoadError::index(path, e))?.len();
        if size > MAX_SNAPSHOT_BYTES as u64 {
            return Err(LoadError::index(
                path,
                format!("index snapshot is {size} bytes, limit is {MAX_SNAPSHOT_BYTES}"),
            ));
        }
        let bytes = fs::read(path).map_err(|e| LoadError::index(path, e))?;
        let fingerprint = blake3::hash(&bytes).to_hex().to_string();
        let snapshot = IndexSnapshot::decode(&bytes).map_err(|e| LoadError::index(path, e))?;
        let index = Self::from_snapshot(snapshot, fingerprint).map_err(|e| LoadError::index(path, e))?;

        info!(
            "Vector index loaded in {:.2}s: {} vectors, {}-d, {:?}, model '{}', blake3 {}",
            started.elapsed().as_secs_f32(),
            index.count(),
            index.dimension,
            index.kind,
            index.model,
            &index.fingerprint[..16]
        );
        Ok(index)
    }

    /// Build an in-memory index from an already decoded snapshot.
    pub fn from_snapshot(snapshot: IndexSnapshot, fingerprint: String) -> Result<Self, String> {
        snapshot.validate()?;
        let IndexSnapshot {
            kind,
            model,
            dimension,
            vectors,
            ..
        } = snapshot;

        let hnsw = match kind {
            IndexKind::Hnsw if !vectors.is_empty() => {
                let mut graph = HNSWIndex::<f32, usize>::new(dimension, &HNSWParams::<f32>::default());
                for (position, vector) in vectors.iter().enumerate() {
                    graph.add(vector, position).map_err(|e| format!("HNSW insert failed: {e}"))?;
                }
                graph
                    .build(Metric::Euclidean)
                    .map_err(|e| format!("HNSW build failed: {e}"))?;
                Some(graph)
            }
            _ => None,
        };

        Ok(Self {
            kind,
            model,
            dimension,
            vectors,
            hnsw,
            fingerprint,
        })
    }

    /// Number of indexed vectors.
    pub fn count(&self) -> usize {
        self.vectors.len()
    }

    /// Width every query must have.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Model id recorded in the snapshot.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn kind(&self) -> IndexKind {
        self.kind
    }

    /// blake3 hex digest of the snapshot file.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Return exactly `k` neighbors of `query`, nearest first.
    ///
    /// When fewer than `k` vectors can be returned, the tail is padded with
    /// [`Neighbor::NONE`].
    ///
    /// # Errors
    /// [`IndexError::DimensionMismatch`] if `query.len() != self.dimension()`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let neighbor = |position: usize, vector: &[f32]| Neighbor {
            distance: squared_euclidean(query, vector),
            position: Some(position),
        };
        let mut hits: Vec<Neighbor> = match &self.hnsw {
            Some(graph) => graph
                .search(query, k)
                .into_iter()
                .filter_map(|position| self.vectors.get(position).map(|v| neighbor(position, v.as_slice())))
                .collect(),
            None => self
                .vectors
                .iter()
                .enumerate()
                .map(|(position, v)| neighbor(position, v.as_slice()))
                .collect(),
        };

        if hits.len() > k {
            hits.select_nth_unstable_by(k - 1, Neighbor::rank);
            hits.truncate(k);
        }
        hits.sort_by(Neighbor::rank);
        hits.dedup_by_key(|n| n.position);

        if hits.len() < k {
            debug!("Index returned {} of {} requested neighbors", hits.len(), k);
        }
        hits.resize(k, Neighbor::NONE);
        Ok(hits)
    }
}

/// `Σ (a[i] - b[i])^2` over equal-length vectors.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}
