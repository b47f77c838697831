//! # Consistency checker
//!
//! Operator diagnostic for a persisted index + metadata pair. It loads both
//! files on its own (it never goes through the
//! [`RetrievalService`](crate::retrieval::RetrievalService)) and reports on
//! each of the following, in order:
//!
//! 1. the index file exists
//! 2. the metadata file exists
//! 3. the index loads and holds at least one vector
//! 4. the metadata loads as a JSON array of strings with at least one entry
//! 5. index count equals metadata length
//! 6. the embedding model's width equals the index width
//! 7. the configured model id equals the one recorded in the snapshot
//! 8. a random probe vector (`k = 1`) resolves to a stored document
//!
//! A failing check never stops the ones after it; the point is a complete
//! report. Checks that cannot run because an earlier step produced nothing
//! to inspect are marked skipped and do not fail the report.
//!
//! ```no_run
//! use awful_rag::checker::ConsistencyChecker;
//! use awful_rag::config::RagConfig;
//!
//! let report = ConsistencyChecker::from_config(&RagConfig::default()).run();
//! println!("{report}");
//! assert!(report.passed());
//! ```

use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::config::{ModelConfig, RagConfig};
use crate::embedding::{Embedder, SentenceEmbeddingsModel};
use crate::error::LoadError;
use crate::metadata::MetadataStore;
use crate::vector_index::VectorIndex;

/// The individual checks, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    IndexFileExists,
    MetadataFileExists,
    IndexLoads,
    MetadataLoads,
    CountsMatch,
    DimensionsMatch,
    ModelMatches,
    SampleLookup,
}

impl fmt::Display for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Check::IndexFileExists => "index file exists",
            Check::MetadataFileExists => "metadata file exists",
            Check::IndexLoads => "index loads",
            Check::MetadataLoads => "metadata loads",
            Check::CountsMatch => "index size matches metadata length",
            Check::DimensionsMatch => "model dimension matches index dimension",
            Check::ModelMatches => "configured model matches index model",
            Check::SampleLookup => "sample search resolves to a document",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CheckStatus {
    Passed(String),
    Failed(String),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome {
    pub check: Check,
    pub status: CheckStatus,
}

/// Itemised result of a checker run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckReport {
    outcomes: Vec<CheckOutcome>,
}

impl CheckReport {
    /// `true` when no check failed.
    pub fn passed(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, CheckStatus::Failed(_)))
    }

    pub fn outcome(&self, check: Check) -> Option<&CheckOutcome> {
        self.outcomes.iter().find(|o| o.check == check)
    }

    pub fn outcomes(&self) -> &[CheckOutcome] {
        &self.outcomes
    }

    fn record(&mut self, check: Check, status: CheckStatus) {
        match &status {
            CheckStatus::Passed(detail) => info!("SUCCESS: {}: {}", check, detail),
            CheckStatus::Failed(detail) => error!("FAILURE: {}: {}", check, detail),
            CheckStatus::Skipped(detail) => warn!("Skipping {}: {}", check, detail),
        }
        self.outcomes.push(CheckOutcome { check, status });
    }
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            let (tag, detail) = match &outcome.status {
                CheckStatus::Passed(d) => ("PASS", d),
                CheckStatus::Failed(d) => ("FAIL", d),
                CheckStatus::Skipped(d) => ("SKIP", d),
            };
            writeln!(f, "[{tag}] {}: {detail}", outcome.check)?;
        }
        if self.passed() {
            write!(f, "Index check PASSED.")
        } else {
            write!(f, "Index check FAILED.")
        }
    }
}

/// Validates that an index snapshot and its metadata belong together.
#[derive(Debug, Clone)]
pub struct ConsistencyChecker {
    index_path: PathBuf,
    metadata_path: PathBuf,
    model: ModelConfig,
}

impl ConsistencyChecker {
    pub fn new(index_path: impl Into<PathBuf>, metadata_path: impl Into<PathBuf>, model: ModelConfig) -> Self {
        Self {
            index_path: index_path.into(),
            metadata_path: metadata_path.into(),
            model,
        }
    }

    pub fn from_config(config: &RagConfig) -> Self {
        Self::new(&config.index_path, &config.metadata_path, config.model.clone())
    }

    /// Run every check; `true` only if none failed.
    pub fn check(&self) -> bool {
        self.run().passed()
    }

    /// Run every check with the MiniLM model from the config.
    pub fn run(&self) -> CheckReport {
        self.run_with(|model: &ModelConfig| {
            SentenceEmbeddingsModel::load(model).map(|m| Box::new(m) as Box<dyn Embedder>)
        })
    }

    /// Run every check with an injected embedding model loader.
    pub fn run_with<F>(&self, load_model: F) -> CheckReport
    where
        F: FnOnce(&ModelConfig) -> Result<Box<dyn Embedder>, LoadError>,
    {
        info!("--- Starting index checks ---");
        let mut report = CheckReport::default();

        report.record(Check::IndexFileExists, file_exists(&self.index_path));
        report.record(Check::MetadataFileExists, file_exists(&self.metadata_path));

        let index = match VectorIndex::load(&self.index_path) {
            Ok(index) => {
                let status = if index.count() == 0 {
                    CheckStatus::Failed("index loaded but contains 0 vectors".to_string())
                } else {
                    CheckStatus::Passed(format!(
                        "{} vectors, {}-d, {:?}, blake3 {}",
                        index.count(),
                        index.dimension(),
                        index.kind(),
                        &index.fingerprint()[..16]
                    ))
                };
                report.record(Check::IndexLoads, status);
                Some(index)
            }
            Err(e) => {
                report.record(Check::IndexLoads, CheckStatus::Failed(e.to_string()));
                None
            }
        };

        let metadata = match MetadataStore::load(&self.metadata_path) {
            Ok(metadata) => {
                let status = if metadata.is_empty() {
                    CheckStatus::Failed("metadata loaded but contains 0 items".to_string())
                } else {
                    CheckStatus::Passed(format!("{} items", metadata.len()))
                };
                report.record(Check::MetadataLoads, status);
                Some(metadata)
            }
            Err(e) => {
                report.record(Check::MetadataLoads, CheckStatus::Failed(e.to_string()));
                None
            }
        };

        report.record(
            Check::CountsMatch,
            match (&index, &metadata) {
                (Some(index), Some(metadata)) if index.count() == metadata.len() => CheckStatus::Passed(format!(
                    "index size ({}) matches metadata length ({})",
                    index.count(),
                    metadata.len()
                )),
                (Some(index), Some(metadata)) => CheckStatus::Failed(format!(
                    "index size ({}) DOES NOT MATCH metadata length ({})",
                    index.count(),
                    metadata.len()
                )),
                _ => CheckStatus::Skipped("index or metadata did not load".to_string()),
            },
        );

        info!("Loading embedding model ({}) to check dimension...", self.model.model_id);
        let model_dimension = load_model(&self.model).map(|model| model.dimension());
        report.record(
            Check::DimensionsMatch,
            match (&index, model_dimension) {
                (_, Err(e)) => CheckStatus::Skipped(format!("could not load embedding model: {e}")),
                (None, Ok(_)) => CheckStatus::Skipped("index did not load".to_string()),
                (Some(index), Ok(d)) if index.dimension() == d => CheckStatus::Passed(format!(
                    "index dimension ({}) matches model dimension ({d})",
                    index.dimension()
                )),
                (Some(index), Ok(d)) => CheckStatus::Failed(format!(
                    "index dimension ({}) DOES NOT MATCH model dimension ({d})",
                    index.dimension()
                )),
            },
        );

        report.record(
            Check::ModelMatches,
            match &index {
                None => CheckStatus::Skipped("index did not load".to_string()),
                Some(index) if index.model() == self.model.model_id => {
                    CheckStatus::Passed(format!("'{}'", index.model()))
                }
                Some(index) => CheckStatus::Failed(format!(
                    "index was built with '{}' but '{}' is configured",
                    index.model(),
                    self.model.model_id
                )),
            },
        );

        report.record(
            Check::SampleLookup,
            match (&index, &metadata) {
                (Some(index), Some(metadata)) if index.count() > 0 => sample_lookup(index, metadata),
                _ => CheckStatus::Skipped("nothing to search".to_string()),
            },
        );

        info!("--- Index checks complete ---");
        if report.passed() {
            info!(">>> RESULT: All checks passed. Index and metadata appear consistent.");
        } else {
            error!(">>> RESULT: One or more checks failed. Please review errors above.");
        }
        report
    }
}

fn file_exists(path: &Path) -> CheckStatus {
    if path.is_file() {
        CheckStatus::Passed(path.display().to_string())
    } else {
        CheckStatus::Failed(format!("not found at {}", path.display()))
    }
}

fn sample_lookup(index: &VectorIndex, metadata: &MetadataStore) -> CheckStatus {
    let mut rng = rand::thread_rng();
    let probe: Vec<f32> = (0..index.dimension()).map(|_| rng.r#gen::<f32>()).collect();

    let neighbor = match index.search(&probe, 1) {
        Ok(hits) => hits.into_iter().next(),
        Err(e) => return CheckStatus::Failed(format!("error during sample search: {e}")),
    };

    match neighbor.and_then(|n| n.position) {
        None => CheckStatus::Skipped("sample search returned no match; cannot test lookup".to_string()),
        Some(position) => match metadata.get(position) {
            Some(text) => {
                let snippet: String = text.chars().take(150).collect();
                CheckStatus::Passed(format!("position {position}: '{snippet}'"))
            }
            None => CheckStatus::Failed(format!(
                "sample search returned position {position}, which is OUT OF BOUNDS for metadata (size {})",
                metadata.len()
            )),
        },
    }
}
