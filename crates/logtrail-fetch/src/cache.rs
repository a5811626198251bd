use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use logtrail_types::LogRecord;

/// One cached record set with its absolute expiry time
struct CacheEntry {
    records: Vec<LogRecord>,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Process-wide TTL cache for fetched record sets.
///
/// One instance is constructed per process and shared by handle; cloning is
/// cheap and clones see the same entries. Capacity is unbounded, record sets
/// are bounded by the query window, and TTL is the only eviction policy.
#[derive(Clone, Default)]
pub struct CacheService {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl CacheService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a non-expired entry. An expired entry is removed on the way
    /// out (lazy expiry) and reported absent.
    pub fn get(&self, key: &str) -> Option<Vec<LogRecord>> {
        let now = Instant::now();
        let mut entries = self.entries.write();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.records.clone()),
            None => None,
        }
    }

    /// Store a record set under a key for `ttl`
    pub fn set(&self, key: impl Into<String>, records: Vec<LogRecord>, ttl: Duration) {
        let entry = CacheEntry {
            records,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key.into(), entry);
    }

    pub fn delete(&self, key: &str) {
        self.entries.write().remove(key);
    }

    /// Drop every entry unconditionally
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Proactively remove all expired entries
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = entries.len(), "cache sweep");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Run `sweep` on a fixed interval as background maintenance,
    /// independent of get/set traffic. Cancel the returned token to stop.
    pub fn spawn_sweeper(&self, interval: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let cache = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick fires immediately; skip it
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => cache.sweep(),
                }
            }
        });

        cancel
    }
}
