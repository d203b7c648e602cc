//! In-memory cache of previewed, not-yet-applied imports.
//!
//! Entries expire after a fixed TTL. Expired entries are purged whenever a
//! new preview is stored; there is no background sweep. Lookups treat an
//! expired entry as absent.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

use crate::models::MedicinePayload;

/// A cached import batch awaiting confirmation.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewEntry {
    pub file_name: String,
    /// Hex SHA-256 of the uploaded bytes
    pub file_sha256: String,
    /// Normalized rows, blank rows already dropped
    pub rows: Vec<MedicinePayload>,
    /// Replace flag chosen at preview time (display only)
    pub replace_all: bool,
    pub created_at: DateTime<Utc>,
}

impl PreviewEntry {
    fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}

/// Mutex-guarded token → entry map.
pub struct PreviewCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, PreviewEntry>>,
}

impl PreviewCache {
    /// Create an empty cache with the given time-to-live.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Store an entry under a fresh token, purging expired entries first.
    pub fn insert(&self, entry: PreviewEntry) -> String {
        self.insert_at(entry, Utc::now())
    }

    /// [`insert`](Self::insert) with an explicit clock.
    pub fn insert_at(&self, entry: PreviewEntry, now: DateTime<Utc>) -> String {
        let token = new_token();
        let mut entries = self.lock();
        purge(&mut entries, self.ttl, now);
        entries.insert(token.clone(), entry);
        token
    }

    /// Look at an entry without removing it.
    pub fn peek(&self, token: &str) -> Option<PreviewEntry> {
        self.peek_at(token, Utc::now())
    }

    /// [`peek`](Self::peek) with an explicit clock.
    pub fn peek_at(&self, token: &str, now: DateTime<Utc>) -> Option<PreviewEntry> {
        self.lock()
            .get(token)
            .filter(|entry| !entry.is_expired(self.ttl, now))
            .cloned()
    }

    /// Remove and return an entry. Only one caller can ever take a given
    /// token; an expired entry is removed and reported as absent.
    pub fn take(&self, token: &str) -> Option<PreviewEntry> {
        self.take_at(token, Utc::now())
    }

    /// [`take`](Self::take) with an explicit clock.
    pub fn take_at(&self, token: &str, now: DateTime<Utc>) -> Option<PreviewEntry> {
        self.lock()
            .remove(token)
            .filter(|entry| !entry.is_expired(self.ttl, now))
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        purge(&mut self.lock(), self.ttl, now)
    }

    /// Number of cached entries, including any not yet purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PreviewEntry>> {
        // The map is always left consistent, so a poisoned lock is still usable
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn purge(entries: &mut HashMap<String, PreviewEntry>, ttl: Duration, now: DateTime<Utc>) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(ttl, now));
    let purged = before - entries.len();
    if purged > 0 {
        tracing::debug!(purged, "Purged expired import previews");
    }
    purged
}

/// Opaque token: a random UUID as 32 hex characters.
fn new_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
