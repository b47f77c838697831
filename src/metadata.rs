//! # Metadata store
//!
//! The document texts behind the vector index, kept in index position order:
//! entry *i* is the text whose embedding sits at position *i*.
//!
//! On disk this is a JSON array of strings. The shape is validated once at
//! load time, so a lookup never has to second-guess what it gets back.

use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::error::LoadError;

/// Ordered, immutable sequence of documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    documents: Vec<String>,
    fingerprint: String,
}

impl MetadataStore {
    pub fn new(documents: Vec<String>) -> Self {
        Self {
            documents,
            fingerprint: String::new(),
        }
    }

    /// Read and validate a metadata file.
    ///
    /// # Errors
    /// [`LoadError::MetadataLoad`] if the file cannot be read or is not a
    /// JSON array of strings.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let started = Instant::now();
        info!("Loading metadata from: {}...", path.display());

        let bytes = fs::read(path).map_err(|e| LoadError::metadata(path, e))?;
        let documents: Vec<String> = serde_json::from_slice(&bytes)
            .map_err(|e| LoadError::metadata(path, format!("expected a JSON array of strings: {e}")))?;
        let fingerprint = blake3::hash(&bytes).to_hex().to_string();

        info!(
            "Metadata loaded in {:.2}s: {} documents, blake3 {}",
            started.elapsed().as_secs_f32(),
            documents.len(),
            &fingerprint[..16]
        );
        Ok(Self {
            documents,
            fingerprint,
        })
    }

    /// Write the documents as a JSON array.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec(&self.documents).map_err(std::io::Error::other)?;
        fs::write(path, json)
    }

    /// Document at `position`, or `None` when out of range.
    pub fn get(&self, position: usize) -> Option<&str> {
        self.documents.get(position).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// blake3 hex digest of the loaded file; empty for in-memory stores.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl From<Vec<String>> for MetadataStore {
    fn from(documents: Vec<String>) -> Self {
        Self::new(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_preserves_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, r#"["apple pie", "car engine", "banana bread"]"#).unwrap();

        let store = MetadataStore::load(&path).unwrap();
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(0), Some("apple pie"));
        assert_eq!(store.get(2), Some("banana bread"));
        assert_eq!(store.get(3), None);
        assert_eq!(store.fingerprint().len(), 64);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let store = MetadataStore::new(vec!["one".into(), "two".into()]);
        store.save(&path).unwrap();

        let loaded = MetadataStore::load(&path).unwrap();
        assert_eq!(loaded.get(1), Some("two"));
    }

    #[test]
    fn test_non_string_entries_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, r#"["fine", 42, {"content": "nested"}]"#).unwrap();

        let err = MetadataStore::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::MetadataLoad { .. }));
    }

    #[test]
    fn test_object_instead_of_sequence_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, r#"{"0": "apple pie"}"#).unwrap();

        assert!(MetadataStore::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_metadata_load_error() {
        let err = MetadataStore::load(Path::new("non/existent/metadata.json")).unwrap_err();
        assert!(matches!(err, LoadError::MetadataLoad { .. }));
    }

    #[test]
    fn test_empty_array_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        fs::write(&path, "[]").unwrap();

        let store = MetadataStore::load(&path).unwrap();
        assert!(store.is_empty());
    }
}
