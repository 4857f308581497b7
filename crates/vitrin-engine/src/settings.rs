//! # Settings Cache
//!
//! Short-TTL cache over the settings row with explicit invalidation.
//! Settings are slow-changing configuration; each operation reads through
//! this cache instead of holding a value indefinitely.

use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use vitrin_core::{Settings, SETTINGS_TTL_SECS};
use vitrin_db::SettingsRepository;

use crate::error::EngineResult;

struct CachedValue {
    settings: Settings,
    loaded_at: Instant,
}

/// TTL cache over [`SettingsRepository`]. Constructed once and shared
/// (`Arc`) across the engine services; never a module-level singleton.
pub struct SettingsCache {
    repo: SettingsRepository,
    ttl: Duration,
    cached: RwLock<Option<CachedValue>>,
}

impl SettingsCache {
    /// Creates a cache with the default TTL.
    pub fn new(repo: SettingsRepository) -> Self {
        Self::with_ttl(repo, Duration::from_secs(SETTINGS_TTL_SECS))
    }

    /// Creates a cache with a custom TTL (tests use zero to disable caching).
    pub fn with_ttl(repo: SettingsRepository, ttl: Duration) -> Self {
        SettingsCache {
            repo,
            ttl,
            cached: RwLock::new(None),
        }
    }

    /// Returns current settings, re-reading the store when the cached value
    /// is older than the TTL.
    pub async fn get(&self) -> EngineResult<Settings> {
        {
            let guard = self.cached.read().await;
            if let Some(value) = guard.as_ref() {
                if value.loaded_at.elapsed() < self.ttl {
                    return Ok(value.settings);
                }
            }
        }

        let settings = self.repo.get().await?;
        debug!("Settings cache refreshed");

        let mut guard = self.cached.write().await;
        *guard = Some(CachedValue {
            settings,
            loaded_at: Instant::now(),
        });
        Ok(settings)
    }

    /// Drops the cached value; the next `get` re-reads the store.
    pub async fn invalidate(&self) {
        let mut guard = self.cached.write().await;
        *guard = None;
    }

    /// Writes new settings and invalidates the cache.
    pub async fn update(&self, settings: &Settings) -> EngineResult<()> {
        self.repo.update(settings).await?;
        self.invalidate().await;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use vitrin_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_cache_serves_stale_until_invalidated() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cache = SettingsCache::new(db.settings());

        let first = cache.get().await.unwrap();
        assert_eq!(first.commission_level1_pct, 5);

        // Write behind the cache's back; within the TTL it still serves
        // the old value.
        let mut updated = first;
        updated.commission_level1_pct = 9;
        db.settings().update(&updated).await.unwrap();
        assert_eq!(cache.get().await.unwrap().commission_level1_pct, 5);

        cache.invalidate().await;
        assert_eq!(cache.get().await.unwrap().commission_level1_pct, 9);
    }

    #[tokio::test]
    async fn test_update_through_cache_invalidate()  {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let cache = SettingsCache::new(db.settings());

        let mut settings = cache.get().await.unwrap();
        settings.min_payout_cents = 50_000;
        cache.update(&settings).await.unwrap();

        assert_eq!(cache.get().await.unwrap().min_payout_cents, 50_000);
    }
}
