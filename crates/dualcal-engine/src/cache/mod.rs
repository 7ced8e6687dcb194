//! Time-bounded cache of fused calibration results.
//!
//! One record is kept per store. A record is usable only when its schema
//! version matches this build, its fingerprint matches the current
//! configuration and it is no older than `cache_ttl_seconds`. Anything
//! else is a miss; stale records are never repaired in place.
//!
//! ```text
//! Absent --store--> Fresh --ttl expiry / config change--> Stale / Mismatch
//! ```

mod store;

pub use store::{FileRecordStore, MemoryRecordStore, RecordStore};

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dualcal_core::config::CalibrationConfig;
use dualcal_core::domain::{CacheRecord, FusedCalibrationResult, CACHE_SCHEMA_VERSION};
use dualcal_core::error::{CacheError, CacheResult};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

/// Outcome of inspecting the stored record against a configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// Usable record.
    Fresh(CacheRecord),
    /// Matching record older than the TTL.
    Stale { age_seconds: i64, ttl_seconds: u64 },
    /// Record written for a different configuration.
    FingerprintMismatch { stored: String, expected: String },
    /// Record written by an incompatible build.
    SchemaMismatch { found: u32, expected: u32 },
    /// Nothing stored.
    Absent,
    /// The record could not be read or parsed.
    Unreadable { reason: String },
}

impl CacheLookup {
    /// The record, if fresh.
    #[must_use]
    pub fn into_fresh(self) -> Option<CacheRecord> {
        match self {
            Self::Fresh(record) => Some(record),
            _ => None,
        }
    }

    /// `true` for [`CacheLookup::Fresh`].
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

impl fmt::Display for CacheLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fresh(record) => write!(f, "fresh (created {})", record.created_at.to_rfc3339()),
            Self::Stale {
                age_seconds,
                ttl_seconds,
            } => write!(f, "stale (age {age_seconds}s exceeds ttl {ttl_seconds}s)"),
            Self::FingerprintMismatch { .. } => write!(f, "written for a different configuration"),
            Self::SchemaMismatch { found, expected } => {
                write!(f, "schema version {found}, expected {expected}")
            }
            Self::Absent => write!(f, "absent"),
            Self::Unreadable { reason } => write!(f, "unreadable: {reason}"),
        }
    }
}

/// Stable SHA-256 hex digest of the configuration's canonical JSON.
///
/// # Errors
///
/// [`CacheError::Serialization`] if the configuration cannot be serialized
/// (for example a non-UTF-8 cache path).
pub fn fingerprint(config: &CalibrationConfig) -> CacheResult<String> {
    let canonical = serde_json::to_vec(config)?;
    Ok(hex::encode(Sha256::digest(&canonical)))
}

/// Reads and writes the calibration record through a [`RecordStore`].
///
/// The cache is the only reader and writer of its store.
pub struct CalibrationCache {
    store: Box<dyn RecordStore>,
}

impl fmt::Debug for CalibrationCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationCache")
            .field("store", &self.store.describe())
            .finish()
    }
}

impl CalibrationCache {
    /// Cache over an arbitrary store.
    pub fn new(store: impl RecordStore + 'static) -> Self {
        Self {
            store: Box::new(store),
        }
    }

    /// Cache persisted to the JSON file at `path`.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileRecordStore::new(path))
    }

    /// Cache that lives only as long as this value.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryRecordStore::new())
    }

    /// Where records are kept.
    #[must_use]
    pub fn location(&self) -> String {
        self.store.describe()
    }

    /// Read the stored record without validating it against a config.
    ///
    /// # Errors
    ///
    /// [`CacheError::Read`] / [`CacheError::Serialization`] for unreadable
    /// data and [`CacheError::SchemaMismatch`] for a record written by an
    /// incompatible build.
    pub fn read(&self) -> CacheResult<Option<CacheRecord>> {
        let Some(contents) = self.store.load()? else {
            return Ok(None);
        };
        let raw: serde_json::Value = serde_json::from_str(&contents)?;
        let found = raw
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| u32::try_from(v).ok())
            .unwrap_or(0);
        if found != CACHE_SCHEMA_VERSION {
            return Err(CacheError::SchemaMismatch {
                found,
                expected: CACHE_SCHEMA_VERSION,
            });
        }
        Ok(Some(serde_json::from_value(raw)?))
    }

    /// Classify the stored record for `config` as of `now`.
    #[must_use]
    pub fn inspect_at(&self, config: &CalibrationConfig, now: DateTime<Utc>) -> CacheLookup {
        let expected = match fingerprint(config) {
            Ok(fp) => fp,
            Err(err) => {
                return CacheLookup::Unreadable {
                    reason: err.to_string(),
                }
            }
        };
        let record = match self.read() {
            Ok(Some(record)) => record,
            Ok(None) => return CacheLookup::Absent,
            Err(CacheError::SchemaMismatch { found, expected }) => {
                return CacheLookup::SchemaMismatch { found, expected }
            }
            Err(err) => {
                return CacheLookup::Unreadable {
                    reason: err.to_string(),
                }
            }
        };

        if record.fingerprint != expected {
            return CacheLookup::FingerprintMismatch {
                stored: record.fingerprint,
                expected,
            };
        }
        if !record.is_fresh_at(now, config.cache_ttl_seconds) {
            return CacheLookup::Stale {
                age_seconds: record.age_at(now).num_seconds(),
                ttl_seconds: config.cache_ttl_seconds,
            };
        }
        CacheLookup::Fresh(record)
    }

    /// Classify the stored record for `config` as of now.
    #[must_use]
    pub fn inspect(&self, config: &CalibrationConfig) -> CacheLookup {
        self.inspect_at(config, Utc::now())
    }

    /// Fresh record for `config` as of `now`, if any. Every other outcome
    /// is a miss.
    #[must_use]
    pub fn lookup_at(&self, config: &CalibrationConfig, now: DateTime<Utc>) -> Option<CacheRecord> {
        match self.inspect_at(config, now) {
            CacheLookup::Fresh(record) => {
                debug!(created_at = %record.created_at, "cache hit");
                Some(record)
            }
            CacheLookup::Unreadable { reason } => {
                warn!(location = %self.location(), %reason, "cache record unreadable; treating as miss");
                None
            }
            miss => {
                debug!(outcome = %miss, "cache miss");
                None
            }
        }
    }

    /// Fresh record for `config`, if any.
    #[must_use]
    pub fn lookup(&self, config: &CalibrationConfig) -> Option<CacheRecord> {
        self.lookup_at(config, Utc::now())
    }

    /// Replace the stored record with `result`, stamped `now`.
    ///
    /// # Errors
    ///
    /// Any [`CacheError`] from serialization or the store. Callers treat
    /// this as a skipped write.
    pub fn store_at(
        &self,
        config: &CalibrationConfig,
        result: &FusedCalibrationResult,
        now: DateTime<Utc>,
    ) -> CacheResult<CacheRecord> {
        let record = CacheRecord::new(fingerprint(config)?, result.clone(), now);
        let json = serde_json::to_string_pretty(&record)?;
        self.store.save(&json)?;
        debug!(location = %self.location(), "cache record written");
        Ok(record)
    }

    /// Replace the stored record with `result`, stamped with the current time.
    ///
    /// # Errors
    ///
    /// See [`CalibrationCache::store_at`].
    pub fn store(
        &self,
        config: &CalibrationConfig,
        result: &FusedCalibrationResult,
    ) -> CacheResult<CacheRecord> {
        self.store_at(config, result, Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_hex() {
        let config = CalibrationConfig::default();
        let a = fingerprint(&config).unwrap();
        let b = fingerprint(&config.clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_covers_every_field() {
        let base = fingerprint(&CalibrationConfig::default()).unwrap();
        let changed = [
            CalibrationConfig {
                dwell_ms: 999,
                ..Default::default()
            },
            CalibrationConfig {
                shared_reference: false,
                ..Default::default()
            },
            CalibrationConfig {
                cache_path: "elsewhere.json".into(),
                ..Default::default()
            },
        ];
        for config in &changed {
            assert_ne!(fingerprint(config).unwrap(), base);
        }
    }

    #[test]
    fn empty_store_is_absent() {
        let cache = CalibrationCache::in_memory();
        assert_eq!(cache.inspect(&CalibrationConfig::default()), CacheLookup::Absent);
    }

    #[test]
    fn garbage_is_unreadable_not_an_error() {
        let store = MemoryRecordStore::new();
        store.save("not json").unwrap();
        let cache = CalibrationCache::new(store);
        let config = CalibrationConfig::default();
        assert!(matches!(cache.inspect(&config), CacheLookup::Unreadable { .. }));
        assert!(cache.lookup(&config).is_none());
    }

    #[test]
    fn other_schema_version_is_a_miss() {
        let store = MemoryRecordStore::new();
        store
            .save(r#"{"schema_version": 7, "fingerprint": "x", "created_at": "2024-01-01T00:00:00Z", "payload": {}}"#)
            .unwrap();
        let cache = CalibrationCache::new(store);
        assert_eq!(
            cache.inspect(&CalibrationConfig::default()),
            CacheLookup::SchemaMismatch {
                found: 7,
                expected: CACHE_SCHEMA_VERSION
            }
        );
    }
}
