#![forbid(unsafe_code)]

//! Durable key/value storage for override content and panel state.
//!
//! The override store never talks to a concrete storage mechanism; it goes
//! through [`StorageBackend`], a flat string-keyed space of string values.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       OverrideStore                           │
//! │   - Knows the fixed keys (content, open, bounds, tab, scroll) │
//! │   - JSON-encodes every value                                  │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     StorageBackend                            │
//! │   - MemoryStorage: in-memory (tests, ephemeral hosts)         │
//! │   - FileStorage: JSON file (requires file-storage)            │
//! │   - browser localStorage (content-expose-web)                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | `StorageError::Io` | File I/O failure | Returns error, nothing written |
//! | `StorageError::Serialization` | JSON encode of the file | Returns error |
//! | `StorageError::Corruption` | Lock poisoned | Returns error |
//! | `StorageError::Unavailable` | No backing store (e.g. no `window`) | Returns error |
//! | Corrupt storage file | Hand edits, partial writes | Reads as empty, logged |
//!
//! Writes are last-write-wins; there is no transaction concept.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

// ─────────────────────────────────────────────────────────────────────────────
// Error Types
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can occur during storage operations.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error during file operations.
    Io(std::io::Error),
    /// Serialization or deserialization error.
    Serialization(String),
    /// Storage is in an inconsistent state.
    Corruption(String),
    /// Backend is not available (e.g., no `localStorage` in this context).
    Unavailable(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {e}"),
            StorageError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            StorageError::Corruption(msg) => write!(f, "storage corruption: {msg}"),
            StorageError::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            StorageError::Serialization(_)
            | StorageError::Corruption(_)
            | StorageError::Unavailable(_) => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

// ─────────────────────────────────────────────────────────────────────────────
// Storage Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for pluggable key/value storage backends.
///
/// Values are opaque strings; callers JSON-encode them. Implementations must
/// survive a full page reload (or process restart) to be useful, since that
/// is how a committed override takes effect.
pub trait StorageBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Read one value. `Ok(None)` when the key was never written or was removed.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write one value, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete one value. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;

    /// Check if the backend is available and functional.
    fn is_available(&self) -> bool {
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory Storage (always available)
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory storage backend for testing and ephemeral hosts.
///
/// State is lost when the process exits. A single instance shared between
/// two contexts stands in for a page reload in tests.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create memory storage pre-populated with entries.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            data: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Copy of every stored entry.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<String, String> {
        self.data.read().map(|g| g.clone()).unwrap_or_default()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "MemoryStorage"
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| StorageError::Corruption("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

impl fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.data.read().map(|g| g.len()).unwrap_or(0);
        f.debug_struct("MemoryStorage")
            .field("entries", &count)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// File Storage (requires file-storage feature)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "file-storage")]
mod file_storage {
    use super::*;
    use serde::{Deserialize, Serialize};
    use std::fs::{self, File};
    use std::io::{BufReader, BufWriter, Write};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// On-disk format.
    #[derive(Serialize, Deserialize)]
    struct StorageFile {
        format_version: u32,
        entries: HashMap<String, String>,
    }

    impl StorageFile {
        const FORMAT_VERSION: u32 = 1;

        fn new(entries: HashMap<String, String>) -> Self {
            Self {
                format_version: Self::FORMAT_VERSION,
                entries,
            }
        }
    }

    /// File-based storage backend for non-browser hosts.
    ///
    /// The whole key space lives in one JSON file:
    ///
    /// ```json
    /// {
    ///   "format_version": 1,
    ///   "entries": {
    ///     "content-expose-open": "true",
    ///     "content-expose-tab": "\"hero\""
    ///   }
    /// }
    /// ```
    ///
    /// Every write rewrites the file through `{path}.tmp` + rename so a
    /// crash mid-write never leaves a truncated file behind.
    pub struct FileStorage {
        path: PathBuf,
        write_lock: Mutex<()>,
    }

    impl FileStorage {
        /// Create a file storage at the given path.
        ///
        /// The file does not need to exist; it will be created on first write.
        #[must_use]
        pub fn new(path: impl AsRef<Path>) -> Self {
            Self {
                path: path.as_ref().to_path_buf(),
                write_lock: Mutex::new(()),
            }
        }

        /// Path of the backing file.
        #[must_use]
        pub fn path(&self) -> &Path {
            &self.path
        }

        fn temp_path(&self) -> PathBuf {
            let mut tmp = self.path.clone();
            tmp.set_extension("json.tmp");
            tmp
        }

        fn read_entries(&self) -> StorageResult<HashMap<String, String>> {
            if !self.path.exists() {
                return Ok(HashMap::new());
            }
            let reader = BufReader::new(File::open(&self.path)?);
            let file: StorageFile = match serde_json::from_reader(reader) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "storage file is corrupt, treating as empty"
                    );
                    return Ok(HashMap::new());
                }
            };
            if file.format_version != StorageFile::FORMAT_VERSION {
                tracing::warn!(
                    stored = file.format_version,
                    expected = StorageFile::FORMAT_VERSION,
                    "storage file format version mismatch, ignoring stored state"
                );
                return Ok(HashMap::new());
            }
            Ok(file.entries)
        }

        fn write_entries(&self, entries: HashMap<String, String>) -> StorageResult<()> {
            if let Some(parent) = self.path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }

            let count = entries.len();
            let tmp_path = self.temp_path();
            {
                let file = File::create(&tmp_path)?;
                let mut writer = BufWriter::new(file);
                serde_json::to_writer_pretty(&mut writer, &StorageFile::new(entries)).map_err(
                    |e| StorageError::Serialization(format!("failed to serialize storage: {e}")),
                )?;
                writer.flush()?;
                writer.get_ref().sync_all()?;
            }
            fs::rename(&tmp_path, &self.path)?;

            tracing::debug!(path = %self.path.display(), entries = count, "wrote storage file");
            Ok(())
        }

        fn update(&self, apply: impl FnOnce(&mut HashMap<String, String>)) -> StorageResult<()> {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|_| StorageError::Corruption("write lock poisoned".into()))?;
            let mut entries = self.read_entries()?;
            apply(&mut entries);
            self.write_entries(entries)
        }
    }

    impl StorageBackend for FileStorage {
        fn name(&self) -> &str {
            "FileStorage"
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.read_entries()?.remove(key))
        }

        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.update(|entries| {
                entries.insert(key.to_owned(), value.to_owned());
            })
        }

        fn remove(&self, key: &str) -> StorageResult<()> {
            self.update(|entries| {
                entries.remove(key);
            })
        }

        fn is_available(&self) -> bool {
            match self.path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    parent.exists() || fs::create_dir_all(parent).is_ok()
                }
                _ => true,
            }
        }
    }

    impl fmt::Debug for FileStorage {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("FileStorage")
                .field("path", &self.path)
                .finish()
        }
    }
}

#[cfg(feature = "file-storage")]
pub use file_storage::FileStorage;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k").unwrap(), None);

        storage.set("k", "\"v\"").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("\"v\""));

        storage.set("k", "\"w\"").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("\"w\""));

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k").unwrap(), None);

        // Removing again is fine.
        storage.remove("k").unwrap();
    }

    #[test]
    fn memory_storage_with_entries() {
        let storage = MemoryStorage::with_entries([("a", "1"), ("b", "2")]);
        assert_eq!(storage.get("a").unwrap().as_deref(), Some("1"));
        assert_eq!(storage.snapshot().len(), 2);
    }

    #[test]
    fn memory_storage_debug_shows_count() {
        let storage = MemoryStorage::with_entries([("a", "1")]);
        assert_eq!(format!("{storage:?}"), "MemoryStorage { entries: 1 }");
    }

    #[test]
    fn storage_error_display() {
        let io = StorageError::Io(std::io::Error::other("disk gone"));
        assert_eq!(io.to_string(), "I/O error: disk gone");
        assert_eq!(
            StorageError::Corruption("lock poisoned".into()).to_string(),
            "storage corruption: lock poisoned"
        );
    }

    #[cfg(feature = "file-storage")]
    mod file {
        use super::super::*;

        #[test]
        fn file_storage_round_trip_across_instances() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("nested").join("state.json");

            let first = FileStorage::new(&path);
            assert!(first.is_available());
            assert_eq!(first.get("open").unwrap(), None);
            first.set("open", "true").unwrap();
            first.set("tab", "\"hero\"").unwrap();

            // A second instance stands in for a restarted process.
            let second = FileStorage::new(&path);
            assert_eq!(second.get("open").unwrap().as_deref(), Some("true"));
            second.remove("open").unwrap();
            assert_eq!(first.get("open").unwrap(), None);
            assert_eq!(first.get("tab").unwrap().as_deref(), Some("\"hero\""));
        }

        #[test]
        fn corrupt_file_reads_as_empty() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("state.json");
            std::fs::write(&path, "{not json").unwrap();

            let storage = FileStorage::new(&path);
            assert_eq!(storage.get("anything").unwrap(), None);

            // Writing replaces the corrupt file with a valid one.
            storage.set("k", "1").unwrap();
            assert_eq!(storage.get("k").unwrap().as_deref(), Some("1"));
        }
    }
}
