//! In-process cache backend

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use super::{effective_ttl, CacheBackend, CacheError, CacheResult};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Thread-safe map with per-entry expiry
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, MemoryEntry>>,
}

static SHARED: OnceLock<Arc<MemoryCache>> = OnceLock::new();

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance
    ///
    /// Every loader built from a `memory` config shares this map, so a
    /// manifest parsed once is visible to all of them.
    pub fn shared() -> Arc<MemoryCache> {
        SHARED.get_or_init(|| Arc::new(MemoryCache::new())).clone()
    }

    /// Number of stored entries, expired ones included until the next write
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop entries whose TTL has passed; returns how many were removed
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        Ok(purge(&mut entries, Instant::now()))
    }

    /// Drop every entry
    pub fn clear(&self) -> CacheResult<()> {
        self.entries.lock().map_err(|_| CacheError::Poisoned)?.clear();
        Ok(())
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> CacheResult<()> {
        let now = Instant::now();
        let expires_at = effective_ttl(ttl).and_then(|d| now.checked_add(d));
        let mut entries = self.entries.lock().map_err(|_| CacheError::Poisoned)?;

        // Superseded keys (old mtime/size) are never read again
        purge(&mut entries, now);
        entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> CacheResult<()> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Poisoned)?
            .remove(key);
        Ok(())
    }
}

fn purge(entries: &mut HashMap<String, MemoryEntry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}
