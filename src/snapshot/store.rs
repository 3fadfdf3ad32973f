//! Whole-file JSON snapshot with atomic replace.

use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::page_extractor::ExtractedRecord;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Failed to read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot {path} is not a valid record array: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Snapshot writer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The persisted record array at one path.
///
/// Loaded once at run start and written once at run end; there is a single
/// writer per path.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{storage_dir}/tender_data/{name}.json`
    #[must_use]
    pub fn in_storage_dir(storage_dir: &Path, name: &str) -> Self {
        Self::new(storage_dir.join("tender_data").join(format!("{name}.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole snapshot. A missing file is an empty snapshot.
    pub async fn load(&self) -> Result<Vec<ExtractedRecord>, SnapshotError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No snapshot at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(SnapshotError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<ExtractedRecord> =
            serde_json::from_str(&contents).map_err(|source| SnapshotError::Parse {
                path: self.path.clone(),
                source,
            })?;
        info!("Loaded {} records from {}", records.len(), self.path.display());
        Ok(records)
    }

    /// Replace the snapshot with `records`.
    ///
    /// Writes a temp file next to the target, fsyncs it, then renames it
    /// over the target, so readers see either the old or the new file.
    pub async fn persist(&self, records: &[ExtractedRecord]) -> Result<(), SnapshotError> {
        let json = serde_json::to_vec_pretty(records)?;
        let path = self.path.clone();
        let count = records.len();

        tokio::task::spawn_blocking(move || write_atomic(&path, &json)).await??;

        info!("Persisted {count} records to {}", self.path.display());
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SnapshotError> {
    let write_err = |source: std::io::Error| SnapshotError::Write {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent).map_err(write_err)?;

    let mut temp_file = NamedTempFile::new_in(parent).map_err(write_err)?;
    temp_file.write_all(contents).map_err(write_err)?;
    temp_file.as_file().sync_all().map_err(write_err)?;
    temp_file.persist(path).map_err(|e| write_err(e.error))?;

    debug!("Atomically replaced {}", path.display());
    Ok(())
}
