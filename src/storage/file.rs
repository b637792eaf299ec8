//! JSON file key-value store
//!
//! Persists the session as a single JSON object of strings in an
//! XDG-compliant data directory (`~/.local/share/cybershield/` on Linux).
//! The file is read once when the store is opened and rewritten on every
//! mutation.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use directories::ProjectDirs;

use super::{KeyValueStore, StorageError};

/// File name of the session store inside the data directory
const SESSION_FILE_NAME: &str = "session.json";

/// A `KeyValueStore` persisted to a JSON file
#[derive(Debug)]
pub struct FileStore {
    /// Path of the backing file
    path: PathBuf,
    /// In-memory copy of the file contents
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Returns the default session file path
    ///
    /// Returns `None` if no home directory can be determined.
    pub fn default_path() -> Option<PathBuf> {
        let project_dirs = ProjectDirs::from("", "", "cybershield")?;
        Some(project_dirs.data_dir().join(SESSION_FILE_NAME))
    }

    /// Opens the store at `path`
    ///
    /// A missing file is treated as an empty session; the file and its parent
    /// directories are created on the first write.
    ///
    /// # Returns
    /// * `Ok(FileStore)` with the current file contents loaded
    /// * `Err(StorageError)` if the file exists but cannot be read or parsed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let values = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Writes the given snapshot to disk
    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(values)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut values = self.lock();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut values = self.lock();
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.flush(&values)
    }
}
