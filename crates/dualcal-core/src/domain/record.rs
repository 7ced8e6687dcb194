//! The persisted calibration cache record.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};

use super::result::FusedCalibrationResult;

/// Schema version written by this build.
pub const CACHE_SCHEMA_VERSION: u32 = 1;

/// One cached calibration, keyed by configuration fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub schema_version: u32,
    /// SHA-256 hex digest of the canonical configuration JSON.
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
    pub payload: FusedCalibrationResult,
}

impl CacheRecord {
    /// A record stamped with the current schema version.
    pub fn new(
        fingerprint: impl Into<String>,
        payload: FusedCalibrationResult,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            schema_version: CACHE_SCHEMA_VERSION,
            fingerprint: fingerprint.into(),
            created_at,
            payload,
        }
    }

    /// Age of the record at `now`. A record from the future has age zero.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> ChronoDuration {
        (now - self.created_at).max(ChronoDuration::zero())
    }

    /// `true` while `age <= ttl_seconds`.
    ///
    /// A TTL too large for a [`ChronoDuration`] never expires.
    #[must_use]
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl_seconds: u64) -> bool {
        match i64::try_from(ttl_seconds)
            .ok()
            .and_then(ChronoDuration::try_seconds)
        {
            Some(ttl) => self.age_at(now) <= ttl,
            None => true,
        }
    }
}
