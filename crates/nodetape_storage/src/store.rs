//! Artifact store with primary, fallback, and disabled locations.

use nodetape_core::TapeError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StoreConfig {
    /// Primary artifact directory
    pub dir: PathBuf,
    /// Directory under the fallback root used when the primary is unusable
    pub fallback_subdir: PathBuf,
    /// Root for the fallback directory (process temp dir when unset)
    #[serde(default)]
    pub fallback_root: Option<PathBuf>,
}

impl StoreConfig {
    /// Create a config with the process temp dir as fallback root
    pub fn new(dir: impl Into<PathBuf>, fallback_subdir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fallback_subdir: fallback_subdir.into(),
            fallback_root: None,
        }
    }

    /// Override the fallback root
    #[must_use]
    pub fn with_fallback_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.fallback_root = Some(root.into());
        self
    }

    fn fallback_dir(&self) -> PathBuf {
        self.fallback_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
            .join(&self.fallback_subdir)
    }
}

/// Store error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// IO error
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
    /// Serialization error
    Serialization {
        /// Underlying cause
        reason: String,
    },
    /// Document could not be parsed
    Parse {
        /// Document path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, reason } => write!(f, "IO error at {}: {}", path.display(), reason),
            Self::Serialization { reason } => write!(f, "Serialization error: {}", reason),
            Self::Parse { path, reason } => {
                write!(f, "Invalid document {}: {}", path.display(), reason)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<StoreError> for TapeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Parse { .. } => {
                TapeError::decode(nodetape_core::DecodeStage::Parse, err)
            }
            other => TapeError::persistence(other),
        }
    }
}

/// Where a store ended up after initialization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Primary directory is usable
    Primary(PathBuf),
    /// Primary failed; the temp-dir fallback is in use
    Fallback(PathBuf),
    /// Both failed; persistence is off
    Disabled,
}

/// Outcome of a write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persisted {
    /// Document written to this path
    Written(PathBuf),
    /// Persistence is disabled; nothing was written
    Disabled,
}

impl Persisted {
    /// Path written, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Written(path) => Some(path),
            Self::Disabled => None,
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct StoreStats {
    /// Documents written
    pub write_count: u64,
    /// Bytes written
    pub bytes_written: u64,
    /// Writes that failed
    pub failed_writes: u64,
    /// Writes skipped because persistence is disabled
    pub skipped_writes: u64,
}

/// Directory of JSON artifacts
pub struct ArtifactStore {
    location: StoreLocation,
    stats: Mutex<StoreStats>,
}

impl ArtifactStore {
    /// Open a store, degrading primary → fallback → disabled
    ///
    /// Never fails. A directory only counts as usable once a probe file
    /// has been created in it.
    #[must_use]
    pub fn open(config: &StoreConfig) -> Self {
        let location = match prepare_dir(&config.dir) {
            Ok(()) => StoreLocation::Primary(config.dir.clone()),
            Err(primary_err) => {
                let fallback = config.fallback_dir();
                tracing::warn!(
                    dir = %config.dir.display(),
                    fallback = %fallback.display(),
                    error = %primary_err,
                    "artifact directory unusable, falling back to temp dir"
                );
                match prepare_dir(&fallback) {
                    Ok(()) => StoreLocation::Fallback(fallback),
                    Err(fallback_err) => {
                        tracing::warn!(
                            fallback = %fallback.display(),
                            error = %fallback_err,
                            "fallback directory unusable, artifacts stay in memory only"
                        );
                        StoreLocation::Disabled
                    }
                }
            }
        };

        Self {
            location,
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// A store that never persists
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            location: StoreLocation::Disabled,
            stats: Mutex::new(StoreStats::default()),
        }
    }

    /// Where the store resolved to
    #[must_use]
    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Active directory, if persistence is enabled
    #[must_use]
    pub fn dir(&self) -> Option<&Path> {
        match &self.location {
            StoreLocation::Primary(dir) | StoreLocation::Fallback(dir) => Some(dir),
            StoreLocation::Disabled => None,
        }
    }

    /// Check if persistence is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.dir().is_some()
    }

    /// Write a document as pretty JSON under `file_name`
    ///
    /// The write goes through a temporary file in the same directory and is
    /// renamed into place, so readers never observe a partial document.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the filesystem write fails
    pub fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        doc: &T,
    ) -> Result<Persisted, StoreError> {
        let Some(dir) = self.dir() else {
            self.with_stats(|s| s.skipped_writes += 1);
            tracing::debug!(file_name, "persistence disabled, skipping write");
            return Ok(Persisted::Disabled);
        };

        let bytes = serde_json::to_vec_pretty(doc).map_err(|e| StoreError::Serialization {
            reason: e.to_string(),
        })?;
        let path = dir.join(sanitize_file_name(file_name));

        match write_atomic(dir, &path, &bytes) {
            Ok(()) => {
                self.with_stats(|s| {
                    s.write_count += 1;
                    s.bytes_written += bytes.len() as u64;
                });
                tracing::debug!(path = %path.display(), bytes = bytes.len(), "artifact written");
                Ok(Persisted::Written(path))
            }
            Err(err) => {
                self.with_stats(|s| s.failed_writes += 1);
                Err(err)
            }
        }
    }

    /// Read a JSON document from any path
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
        let bytes = std::fs::read(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// List `.json` artifacts in the active directory, sorted by name
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be read
    pub fn list(&self) -> Result<Vec<PathBuf>, StoreError> {
        let Some(dir) = self.dir() else {
            return Ok(Vec::new());
        };
        let entries = std::fs::read_dir(dir).map_err(|e| StoreError::Io {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Get store statistics
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_stats(&self, f: impl FnOnce(&mut StoreStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut stats);
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Replace characters that are unsafe in file names with `_`
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn prepare_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    // create_dir_all succeeds on existing read-only directories
    tempfile::Builder::new()
        .prefix(".nodetape-probe")
        .tempfile_in(dir)
        .map(drop)
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let io_err = |e: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(bytes).map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
