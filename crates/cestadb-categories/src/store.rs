//! Durable storage for one market's mapping set.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::StoreError;
use crate::mapping::MappingFile;

/// Whole-snapshot persistence for a mapping set.
///
/// `save` must replace the previous snapshot entirely so a failed save can
/// simply be retried.
pub trait MappingStore {
    /// Read the stored snapshot, `Ok(None)` if nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a snapshot exists but cannot be read or parsed.
    fn load(&self) -> Result<Option<MappingFile>, StoreError>;

    /// Replace the stored snapshot.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the snapshot cannot be written.
    fn save(&self, file: &MappingFile) -> Result<(), StoreError>;

    /// Where the snapshot lives, for log messages.
    fn location(&self) -> String;
}

/// Pretty-printed JSON file, replaced atomically via a sibling temp file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `{dir}/{market}.json`
    #[must_use]
    pub fn for_market(dir: &Path, market: &str) -> Self {
        Self::new(dir.join(format!("{market}.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl MappingStore for JsonFileStore {
    fn load(&self) -> Result<Option<MappingFile>, StoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| StoreError::Parse {
                path: self.path.display().to_string(),
                source: e,
            })
    }

    fn save(&self, file: &MappingFile) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.io_error(e))?;

        let mut json = serde_json::to_vec_pretty(file)?;
        json.push(b'\n');

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.io_error(e))?;
        tmp.write_all(&json).map_err(|e| self.io_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| StoreError::Persist {
            path: self.path.display().to_string(),
            source: e,
        })?;

        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
