// ============================================
// Eligibility Cache
// ============================================
//
// Keyed, TTL-bounded store of resolved sponsor id sets.
// Each entry is written as one value, so readers see either the old
// (ids, expiry) pair or the new one.

use crate::models::{EligibilityTier, ListingId};
use crate::redis_client::SharedRedis;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Longest lifetime any entry is given
pub const MAX_CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// A resolved eligible-id set and the tier that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedEligibility {
    pub tier: EligibilityTier,
    pub ids: Vec<ListingId>,
    pub cached_at: DateTime<Utc>,
}

impl CachedEligibility {
    pub fn new(tier: EligibilityTier, ids: Vec<ListingId>) -> Self {
        Self {
            tier,
            ids,
            cached_at: Utc::now(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EligibilityCache: Send + Sync {
    /// `None` when the key is missing or expired
    async fn get(&self, key: &str) -> CacheResult<Option<CachedEligibility>>;

    async fn put(&self, key: &str, entry: &CachedEligibility, ttl: Duration) -> CacheResult<()>;

    async fn evict(&self, key: &str) -> CacheResult<()>;
}

struct CacheSlot {
    entry: CachedEligibility,
    expires_at: Instant,
}

/// In-process cache; expired entries are dropped lazily on read
#[derive(Default)]
pub struct InMemoryEligibilityCache {
    entries: DashMap<String, CacheSlot>,
}

impl InMemoryEligibilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl EligibilityCache for InMemoryEligibilityCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedEligibility>> {
        let now = Instant::now();

        if let Some(slot) = self.entries.get(key) {
            if slot.expires_at > now {
                debug!(key = %key, ids = slot.entry.ids.len(), "Eligibility cache hit");
                return Ok(Some(slot.entry.clone()));
            }
        }

        // The read guard above must be released before removing
        self.entries.remove_if(key, |_, slot| slot.expires_at <= now);
        debug!(key = %key, "Eligibility cache miss");
        Ok(None)
    }

    async fn put(&self, key: &str, entry: &CachedEligibility, ttl: Duration) -> CacheResult<()> {
        let slot = CacheSlot {
            entry: entry.clone(),
            expires_at: Instant::now() + ttl.min(MAX_CACHE_TTL),
        };
        self.entries.insert(key.to_string(), slot);
        Ok(())
    }

    async fn evict(&self, key: &str) -> CacheResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis-backed cache. Entries are JSON strings written with `SET EX`.
#[derive(Clone)]
pub struct RedisEligibilityCache {
    redis: SharedRedis,
}

impl RedisEligibilityCache {
    pub fn new(redis: SharedRedis) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl EligibilityCache for RedisEligibilityCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CachedEligibility>> {
        let mut conn = self.redis.lock().await;
        let data: Option<String> = conn.get(key).await?;

        match data {
            Some(json) => match serde_json::from_str::<CachedEligibility>(&json) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    warn!(key = %key, error = %e, "Corrupted eligibility cache entry, dropping");
                    let _ = conn.del::<_, ()>(key).await;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, entry: &CachedEligibility, ttl: Duration) -> CacheResult<()> {
        let json = serde_json::to_string(entry)?;
        // SET EX rejects a zero expiry
        let ttl_secs = ttl.min(MAX_CACHE_TTL).as_secs().max(1);

        let mut conn = self.redis.lock().await;
        conn.set_ex::<_, _, ()>(key, json, ttl_secs).await?;
        Ok(())
    }

    async fn evict(&self, key: &str) -> CacheResult<()> {
        let mut conn = self.redis.lock().await;
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
