use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use tempfile::Builder;

use crate::error::SlError;

pub const AUTHORITY_FILE: &str = "hgnc_complete_set.txt";

/// Cache layout for downloaded reference files.
#[derive(Debug, Clone)]
pub struct Store {
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new() -> Result<Self, SlError> {
        let cache_root = BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("synleth-harmonizer"))
                    .ok()
            })
            .ok_or_else(|| SlError::Filesystem("unable to resolve cache directory".to_string()))?;
        Ok(Self { cache_root })
    }

    pub fn new_with_paths(cache_root: Utf8PathBuf) -> Self {
        Self { cache_root }
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn authority_path(&self) -> Utf8PathBuf {
        self.cache_root.join("hgnc").join(AUTHORITY_FILE)
    }

    pub fn authority_metadata_path(&self) -> Utf8PathBuf {
        self.cache_root.join("metadata").join("hgnc.json")
    }

    pub fn read_metadata(path: &Utf8Path) -> Result<Option<Metadata>, SlError> {
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| SlError::Filesystem(err.to_string()))?;
        let metadata =
            serde_json::from_str(&content).map_err(|err| SlError::Filesystem(err.to_string()))?;
        Ok(Some(metadata))
    }

    pub fn write_metadata(path: &Utf8Path, metadata: &Metadata) -> Result<(), SlError> {
        let content = serde_json::to_vec_pretty(metadata)
            .map_err(|err| SlError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    /// Writes through a temporary file in the target directory, then renames it.
    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), SlError> {
        let parent = ensure_parent(path)?;
        let temp = Builder::new()
            .prefix(".slh-write")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| SlError::Filesystem(err.to_string()))?;
        fs::write(temp.path(), content).map_err(|err| SlError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| SlError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

/// Creates the parent directory of `path` and returns it (`.` for bare file names).
pub fn ensure_parent(path: &Utf8Path) -> Result<Utf8PathBuf, SlError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent.to_path_buf(),
        _ => Utf8PathBuf::from("."),
    };
    fs::create_dir_all(parent.as_std_path()).map_err(|err| SlError::Filesystem(err.to_string()))?;
    Ok(parent)
}

/// Provenance of a downloaded reference file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub source: String,
    pub dataset_type: String,
    pub url: String,
    pub downloaded_at: String,
    pub tool: String,
    pub resolved_path: String,
}
