use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::storage::error::{StorageResult, StorageSystemError};
use crate::storage::provider::StorageProvider;

/// Local filesystem storage provider.
///
/// Relative paths resolve against `base_path`; absolute paths are used as given.
#[derive(Clone)]
pub struct LocalStorageProvider {
    base_path: PathBuf,
}

impl LocalStorageProvider {
    /// Create a new local storage provider with the given base path
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// The directory relative paths are resolved against
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a relative path against the base path
    fn resolve_path<P: AsRef<Path>>(&self, path: P) -> PathBuf {
        self.base_path.join(path)
    }
}

impl StorageProvider for LocalStorageProvider {
    fn name(&self) -> &str {
        "local"
    }

    fn exists(&self, path: &Path) -> bool {
        self.resolve_path(path).exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        self.resolve_path(path).is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.resolve_path(path).is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        let full_path = self.resolve_path(path);
        fs::create_dir_all(&full_path)
            .map_err(|e| StorageSystemError::io(e, "create_dir_all", full_path))
    }

    fn canonicalize(&self, path: &Path) -> StorageResult<PathBuf> {
        let full_path = self.resolve_path(path);
        if !full_path.exists() {
            return Err(StorageSystemError::FileNotFound(full_path));
        }
        fs::canonicalize(&full_path).map_err(|e| StorageSystemError::io(e, "canonicalize", full_path))
    }

    fn read_to_string(&self, path: &Path) -> StorageResult<String> {
        let full_path = self.resolve_path(path);
        if !full_path.exists() {
            return Err(StorageSystemError::FileNotFound(full_path));
        }
        fs::read_to_string(&full_path)
            .map_err(|e| StorageSystemError::io(e, "read_to_string", full_path))
    }

    fn write_string(&self, path: &Path, contents: &str) -> StorageResult<()> {
        self.write_bytes(path, contents.as_bytes())
    }

    fn write_bytes(&self, path: &Path, contents: &[u8]) -> StorageResult<()> {
        let full_path = self.resolve_path(path);

        let parent = match full_path.parent() {
            Some(parent) => parent.to_path_buf(),
            None => {
                return Err(StorageSystemError::NoParent(full_path));
            }
        };
        if !parent.is_dir() {
            self.create_dir_all(&parent)?;
        }

        // Write into a sibling temp file, then persist over the target
        let temp_file = NamedTempFile::new_in(&parent)
            .map_err(|e| StorageSystemError::io(e, "create_temp_file", parent.clone()))?;
        temp_file
            .as_file()
            .write_all(contents)
            .map_err(|e| StorageSystemError::io(e, "write_to_temp_file", temp_file.path().to_path_buf()))?;
        temp_file
            .persist(&full_path)
            .map_err(|e| StorageSystemError::io(e.error, "persist_temp_file", full_path.clone()))?;

        Ok(())
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        let full_path = self.resolve_path(path);
        fs::remove_file(&full_path).map_err(|e| StorageSystemError::io(e, "remove_file", full_path))
    }

    fn read_dir(&self, path: &Path) -> StorageResult<Vec<PathBuf>> {
        let full_path = self.resolve_path(path);
        let entries = fs::read_dir(&full_path)
            .map_err(|e| StorageSystemError::io(e, "read_dir", full_path.clone()))?;
        let mut result = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageSystemError::io(e, "read_dir_entry", full_path.clone()))?;
            result.push(entry.path());
        }
        result.sort();
        Ok(result)
    }
}

impl fmt::Debug for LocalStorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalStorageProvider")
            .field("base_path", &self.base_path)
            .finish()
    }
}
