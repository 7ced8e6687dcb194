//! Durable storage for the single cache record.
//!
//! A [`RecordStore`] moves opaque JSON text; interpreting it (schema check,
//! fingerprint, TTL) is the job of [`CalibrationCache`](super::CalibrationCache).

use std::path::{Path, PathBuf};

use dualcal_core::error::{CacheError, CacheResult};
use parking_lot::Mutex;

/// Backing storage for one serialized cache record.
pub trait RecordStore: Send + Sync {
    /// Read the stored record, or `None` if nothing has been stored.
    fn load(&self) -> CacheResult<Option<String>>;

    /// Replace the stored record with `contents`.
    ///
    /// A reader never observes a partially written record.
    fn save(&self, contents: &str) -> CacheResult<()>;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;
}

// ---------------------------------------------------------------------------
// FileRecordStore
// ---------------------------------------------------------------------------

/// Stores the record in a JSON file.
///
/// Writes go to `<path>.tmp` and are renamed over `<path>`.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    path: PathBuf,
}

impl FileRecordStore {
    /// Store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the record file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl RecordStore for FileRecordStore {
    fn load(&self) -> CacheResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn save(&self, contents: &str) -> CacheResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CacheError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = self.temp_path();
        std::fs::write(&tmp, contents).map_err(|source| CacheError::Write {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| CacheError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

/// Keeps the record in memory. Useful for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    slot: Mutex<Option<String>>,
}

impl MemoryRecordStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryRecordStore {
    fn load(&self) -> CacheResult<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, contents: &str) -> CacheResult<()> {
        *self.slot.lock() = Some(contents.to_owned());
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_store_round_trip_and_atomic_replace() {
        let tmp = tempdir().unwrap();
        let store = FileRecordStore::new(tmp.path().join("sub").join("cache.json"));

        assert_eq!(store.load().unwrap(), None);
        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
        assert!(!tmp.path().join("sub").join("cache.json.tmp").exists());
    }

    #[test]
    fn file_store_reports_unwritable_location() {
        let tmp = tempdir().unwrap();
        // A regular file where a directory is expected.
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let store = FileRecordStore::new(blocker.join("cache.json"));
        assert!(matches!(store.save("data"), Err(CacheError::Write { .. })));
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryRecordStore::new();
        assert_eq!(store.load().unwrap(), None);
        store.save("{}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{}"));
        assert_eq!(store.describe(), "memory");
    }
}
