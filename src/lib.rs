//! # Awful RAG (library root)
//!
//! Semantic retrieval over a precomputed document collection. Given a
//! natural-language query, the crate returns the stored passages nearest to it
//! in embedding space, most relevant first.
//!
//! The pieces, leaves first:
//! - [`embedding`]: sentence embeddings with Candle (all-MiniLM-L6-v2 by default).
//! - [`vector_index`]: the persisted nearest-neighbor index (`hora` HNSW or exact scan).
//! - [`metadata`]: document texts aligned with index positions.
//! - [`retrieval`]: the [`RetrievalService`] that ties them together and
//!   degrades to empty answers instead of failing.
//! - [`checker`]: the [`ConsistencyChecker`] operator diagnostic.
//!
//! Supporting modules: [`config`] (YAML configuration), [`error`] (typed
//! failures), [`commands`] (CLI definition for the `arag` binary).
//!
//! Building the index (embedding a corpus and writing the snapshot) happens
//! offline and is not part of this crate.
//!
//! ## Quick start
//! ```no_run
//! use awful_rag::{RagConfig, RetrievalService};
//!
//! let service = RetrievalService::load(&RagConfig::default());
//! let context = service.search("How do I bake banana bread?", 3);
//! ```

use directories::ProjectDirs;
use std::error::Error;

pub mod checker;
pub mod commands;
pub mod config;
pub mod embedding;
pub mod error;
pub mod metadata;
pub mod retrieval;
pub mod vector_index;

#[cfg(test)]
mod test_support;

pub use checker::{CheckReport, ConsistencyChecker};
pub use config::RagConfig;
pub use embedding::{Embedder, SentenceEmbeddingsModel};
pub use error::LoadError;
pub use metadata::MetadataStore;
pub use retrieval::{Retrieval, RetrievalService, ServiceState};
pub use vector_index::{IndexKind, IndexSnapshot, Neighbor, VectorIndex};

/// Return the per-platform configuration directory used by Awful RAG.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "awful-sec", "arag")`, so you get the right place on each OS
/// (e.g., `~/Library/Application Support/com.awful-sec.arag` on macOS).
///
/// The directory is **not** created by this function; callers that need it should
/// create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined
/// (which is rare but possible in heavily sandboxed environments).
///
/// # Examples
/// ```rust
/// let cfg = awful_rag::config_dir().expect("has a config dir");
/// println!("config at {}", cfg.display());
/// ```
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "arag")
        .ok_or("Unable to determine config directory")?;
    let config_dir = proj_dirs.config_dir().to_path_buf();

    Ok(config_dir)
}
