//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `RagConfig` struct, which holds the locations of the persisted
//! index snapshot and metadata file together with the embedding model to use,
//! and a `load_config` function to load the configuration from a file.
//!
//! Every field has a default, so a partial YAML file (or none at all) is valid.
//!
//! # Examples
//!
//! Loading the configuration from a file:
//!
//! ```no_run
//! use awful_rag::config::{RagConfig, load_config};
//!
//! let config_file_path = "/path/to/config.yaml";
//! let config: RagConfig = load_config(config_file_path).unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{error::Error, fs, path::PathBuf};

/// Model used to build the default index snapshot.
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// Represents the application's configuration.
///
/// Holds everything the retrieval service and the consistency checker need
/// at startup. Constructed from YAML with [`load_config`] or via `Default`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct RagConfig {
    /// Persisted vector index snapshot.
    pub index_path: PathBuf,

    /// JSON array of document texts, aligned with the index by position.
    pub metadata_path: PathBuf,

    /// Embedding model; must match the one the index was built with.
    pub model: ModelConfig,

    /// Result count used when the caller does not choose one.
    pub default_k: usize,

    // Requests above this are clamped.
    pub max_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("rag_index/index.bin"),
            metadata_path: PathBuf::from("rag_index/metadata.json"),
            model: ModelConfig::default(),
            default_k: 3,
            max_k: 50,
        }
    }
}

/// Where the sentence embedding model comes from.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// Hugging Face repository id.
    pub model_id: String,

    /// Repository revision (branch, tag or commit).
    pub revision: String,

    /// Directory already holding `config.json`, `tokenizer.json` and
    /// `model.safetensors`. When set, the Hub is never contacted.
    pub local_dir: Option<PathBuf>,

    /// Overrides the hf-hub cache location.
    pub cache_dir: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            revision: "main".to_string(),
            local_dir: None,
            cache_dir: None,
        }
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Parameters
///
/// - `file`: The path to the YAML configuration file.
///
/// # Returns
///
/// - `Ok(RagConfig)`: The loaded configuration.
/// - `Err(Box<dyn Error>)`: An error occurred while reading the file or parsing the YAML.
///
/// # Examples
///
/// ```no_run
/// use awful_rag::config::load_config;
///
/// match load_config("/path/to/config.yaml") {
///     Ok(config) => println!("{:?}", config),
///     Err(err) => eprintln!("Error loading config: {}", err),
/// }
/// ```
pub fn load_config(file: &str) -> Result<RagConfig, Box<dyn Error>> {
    tracing::debug!("Loading config from: {}", file);
    let content = fs::read_to_string(file)?;
    let config: RagConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_valid_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
index_path: "/srv/rag/index.bin"
metadata_path: "/srv/rag/metadata.json"
model:
  model_id: "sentence-transformers/all-MiniLM-L6-v2"
  revision: "main"
  local_dir: "/opt/models/minilm"
default_k: 5
max_k: 20
"#
        )
        .unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_ok());
        let config = config.unwrap();
        assert_eq!(config.index_path, PathBuf::from("/srv/rag/index.bin"));
        assert_eq!(config.metadata_path, PathBuf::from("/srv/rag/metadata.json"));
        assert_eq!(config.model.model_id, DEFAULT_MODEL_ID);
        assert_eq!(config.model.local_dir, Some(PathBuf::from("/opt/models/minilm")));
        assert_eq!(config.model.cache_dir, None);
        assert_eq!(config.default_k, 5);
        assert_eq!(config.max_k, 20);
    }

    #[test]
    fn test_load_config_partial_file_uses_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "default_k: 7").unwrap();

        let config = load_config(temp_file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.default_k, 7);
        assert_eq!(config.index_path, RagConfig::default().index_path);
        assert_eq!(config.model, ModelConfig::default());
    }

    #[test]
    fn test_load_config_invalid_file() {
        let config = load_config("non/existent/path");
        assert!(config.is_err());
    }

    #[test]
    fn test_load_config_invalid_format() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, r#"invalid: config: format"#).unwrap();

        let config = load_config(temp_file.path().to_str().unwrap());

        assert!(config.is_err());
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&RagConfig::default()).unwrap();
        let parsed: RagConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, RagConfig::default());
    }
}
