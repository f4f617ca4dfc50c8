//! Time-expiring response cache keyed by sanitized topic and stage.
//!
//! A convenience layer, not a correctness-critical store: entries expire
//! on a fixed TTL, writes are last-write-wins, and there is no size bound
//! or manual invalidation. The cache is constructed explicitly and
//! injected into the orchestration service so tests can substitute a
//! short-lived instance.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

use crate::panel::{Opinion, Persona};

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Pipeline stage a cache entry belongs to.
///
/// Keys are always stage-suffixed so that generated, confirmed, and
/// simulated payloads for the same topic never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStage {
    /// Personas produced by the generation stage.
    Generated,
    /// Personas confirmed (possibly edited) by the client.
    Confirmed,
    /// Opinions produced by the simulation stage.
    Simulated,
}

impl CacheStage {
    /// Key suffix for this stage.
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Generated => "generated",
            Self::Confirmed => "confirmed",
            Self::Simulated => "simulated",
        }
    }
}

/// Build the cache key for a sanitized topic and stage.
pub fn cache_key(topic: &str, stage: CacheStage) -> String {
    format!("{topic}-{}", stage.suffix())
}

/// Payload stored against one cache key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedPayload {
    /// A persona panel (generated or confirmed).
    Personas(Vec<Persona>),
    /// Simulated opinions.
    Opinions(Vec<Opinion>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    payload: CachedPayload,
    expires_at: Instant,
}

/// In-process TTL key→value store.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    /// Create a cache whose entries live for `ttl` from write time.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a key. Expired entries behave as a miss and are purged.
    pub async fn get(&self, key: &str) -> Option<CachedPayload> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.payload.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a payload, unconditionally overwriting any previous entry.
    pub async fn set(&self, key: &str, payload: CachedPayload) {
        let expires_at = Instant::now()
            .checked_add(self.ttl)
            .unwrap_or_else(Instant::now);
        let mut entries = self.entries.write().await;
        entries.insert(key.to_owned(), CacheEntry { payload, expires_at });
    }

    /// Number of live (unexpired) entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().await;
        entries.values().filter(|e| e.expires_at > now).count()
    }

    /// Whether the cache currently holds no live entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
