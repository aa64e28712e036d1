//! Scoped read-through cache.
//!
//! One slot per `(project, scope)`, stored in a `moka` cache. Each slot
//! remembers the version token of its scope at the time the value was loaded;
//! invalidation removes the slot and bumps the token, so a fill that raced
//! with an invalidation is dropped instead of cached.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use moka::sync::Cache;
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Stage;

/// A named partition of cached state, invalidated independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Stage(Stage),
    Characters,
    Scenes,
    Metadata,
}

impl Scope {
    /// Every scope of a project.
    pub fn all() -> impl Iterator<Item = Scope> {
        Stage::all()
            .map(Scope::Stage)
            .chain([Scope::Characters, Scope::Scenes, Scope::Metadata])
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stage(stage) => write!(f, "stage:{stage}"),
            Self::Characters => f.write_str("characters"),
            Self::Scenes => f.write_str("scenes"),
            Self::Metadata => f.write_str("metadata"),
        }
    }
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    /// Rounded to one decimal. Zero when nothing has been requested.
    pub hit_rate_percent: f64,
}

impl CacheStats {
    fn from_counts(hits: u64, misses: u64) -> Self {
        let total_requests = hits + misses;
        let hit_rate_percent = if total_requests == 0 {
            0.0
        } else {
            (hits as f64 / total_requests as f64 * 1000.0).round() / 10.0
        };
        Self {
            hits,
            misses,
            total_requests,
            hit_rate_percent,
        }
    }
}

type SlotKey = (String, Scope);

/// Slots kept before moka starts evicting. Evicted slots simply miss.
const DEFAULT_MAX_SLOTS: u64 = 4_096;

#[derive(Clone)]
struct Slot {
    version: u64,
    value: Arc<dyn Any + Send + Sync>,
}

/// Read-through cache with per-scope invalidation.
///
/// Values live in a `moka` cache. Version tokens live beside it under a
/// mutex, and every insert or invalidation happens while that mutex is held,
/// so a slot can never be stored under a version that has already moved on.
pub struct ScopedCache {
    slots: Cache<SlotKey, Slot>,
    versions: Mutex<HashMap<SlotKey, u64>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Default for ScopedCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_MAX_SLOTS)
    }
}

impl ScopedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(max_slots: u64) -> Self {
        Self {
            slots: Cache::new(max_slots),
            versions: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn lock_versions(&self) -> Result<MutexGuard<'_, HashMap<SlotKey, u64>>> {
        self.versions.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Return the cached value of `scope`, or load, cache and return it.
    ///
    /// A loader error is returned as-is and nothing is cached.
    pub fn get_or_load<T, F>(&self, project_id: &str, scope: Scope, loader: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        let key = (project_id.to_string(), scope);

        let loaded_at = {
            let versions = self.lock_versions()?;
            let current = versions.get(&key).copied().unwrap_or(0);
            if let Some(slot) = self.slots.get(&key) {
                if slot.version == current {
                    if let Ok(value) = slot.value.downcast::<T>() {
                        self.hits.fetch_add(1, Ordering::Relaxed);
                        debug!(project_id, %scope, "Cache hit");
                        return Ok(value);
                    }
                }
            }
            current
        };

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(project_id, %scope, "Cache miss");
        let value = Arc::new(loader()?);

        let versions = self.lock_versions()?;
        if versions.get(&key).copied().unwrap_or(0) == loaded_at {
            let slot = Slot {
                version: loaded_at,
                value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
            };
            self.slots.insert(key, slot);
        } else {
            debug!(project_id, %scope, "Dropped fill superseded by invalidation");
        }

        Ok(value)
    }

    /// Clear exactly one slot and advance its version token.
    pub fn invalidate(&self, project_id: &str, scope: Scope) -> Result<()> {
        let mut versions = self.lock_versions()?;
        self.bump(&mut versions, (project_id.to_string(), scope));
        debug!(project_id, %scope, "Cache invalidated");
        Ok(())
    }

    /// Clear every slot of a project.
    pub fn invalidate_all(&self, project_id: &str) -> Result<()> {
        let mut versions = self.lock_versions()?;
        for scope in Scope::all() {
            self.bump(&mut versions, (project_id.to_string(), scope));
        }
        debug!(project_id, "Cache invalidated for all scopes");
        Ok(())
    }

    fn bump(&self, versions: &mut HashMap<SlotKey, u64>, key: SlotKey) {
        self.slots.invalidate(&key);
        *versions.entry(key).or_insert(0) += 1;
    }

    /// Current version token of a scope.
    pub fn version(&self, project_id: &str, scope: Scope) -> Result<u64> {
        let versions = self.lock_versions()?;
        Ok(versions
            .get(&(project_id.to_string(), scope))
            .copied()
            .unwrap_or(0))
    }

    pub fn is_cached(&self, project_id: &str, scope: Scope) -> Result<bool> {
        let key = (project_id.to_string(), scope);
        let versions = self.lock_versions()?;
        let current = versions.get(&key).copied().unwrap_or(0);
        Ok(self
            .slots
            .get(&key)
            .is_some_and(|slot| slot.version == current))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::from_counts(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    /// Zero the counters. Cached content is untouched.
    pub fn reset_stats(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn stage(n: i64) -> Scope {
        Scope::Stage(Stage::new(n).unwrap())
    }

    #[test]
    fn test_scope_display_and_count() {
        assert_eq!(stage(3).to_string(), "stage:3");
        assert_eq!(Scope::Characters.to_string(), "characters");
        assert_eq!(Scope::all().count(), 13);
    }

    #[test]
    fn test_empty_stats_have_zero_hit_rate() {
        let cache = ScopedCache::new();
        let stats = cache.stats();
        assert_eq!(stats.total_requests, 0);
        assert_eq!(stats.hit_rate_percent, 0.0);
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = ScopedCache::new();
        let loads = Cell::new(0);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(String::from("summary"))
        };

        let first = cache.get_or_load("nova", stage(1), load).unwrap();
        let second = cache.get_or_load("nova", stage(1), load).unwrap();

        assert_eq!(*first, "summary");
        assert_eq!(*second, "summary");
        assert_eq!(loads.get(), 1);

        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (1, 1));
        assert_eq!(stats.hit_rate_percent, 50.0);
    }

    #[test]
    fn test_invalidate_clears_only_that_scope() {
        let cache = ScopedCache::new();
        cache.get_or_load("nova", Scope::Scenes, || Ok(1u32)).unwrap();
        cache.get_or_load("nova", Scope::Characters, || Ok(2u32)).unwrap();

        cache.invalidate("nova", Scope::Scenes).unwrap();

        assert!(!cache.is_cached("nova", Scope::Scenes).unwrap());
        assert!(cache.is_cached("nova", Scope::Characters).unwrap());
        assert_eq!(cache.version("nova", Scope::Scenes).unwrap(), 1);

        let value = cache.get_or_load("nova", Scope::Scenes, || Ok(3u32)).unwrap();
        assert_eq!(*value, 3);
    }

    #[test]
    fn test_fill_racing_invalidation_is_not_cached() {
        let cache = ScopedCache::new();
        let value = cache
            .get_or_load("nova", Scope::Metadata, || {
                cache.invalidate("nova", Scope::Metadata)?;
                Ok("stale")
            })
            .unwrap();

        assert_eq!(*value, "stale");
        assert!(!cache.is_cached("nova", Scope::Metadata).unwrap());
    }

    #[test]
    fn test_loader_error_is_not_cached() {
        let cache = ScopedCache::new();
        let result = cache.get_or_load::<u32, _>("nova", Scope::Scenes, || {
            Err(Error::not_found("scene list", "nova"))
        });

        assert!(result.unwrap_err().is_not_found());
        assert!(!cache.is_cached("nova", Scope::Scenes).unwrap());
    }

    #[test]
    fn test_invalidate_all_is_per_project() {
        let cache = ScopedCache::new();
        cache.get_or_load("nova", stage(2), || Ok(1u8)).unwrap();
        cache.get_or_load("ember", stage(2), || Ok(1u8)).unwrap();

        cache.invalidate_all("nova").unwrap();

        assert!(!cache.is_cached("nova", stage(2)).unwrap());
        assert!(cache.is_cached("ember", stage(2)).unwrap());
    }

    #[test]
    fn test_small_capacity_still_serves_current_values() {
        let cache = ScopedCache::with_capacity(1);
        for round in 0..5u32 {
            for scope in Scope::all() {
                let value = cache.get_or_load("nova", scope, || Ok(round)).unwrap();
                assert_eq!(*value, round);
            }
            cache.invalidate_all("nova").unwrap();
        }
        assert_eq!(cache.version("nova", Scope::Scenes).unwrap(), 5);
    }

    #[test]
    fn test_reset_stats_keeps_content() {
        let cache = ScopedCache::new();
        cache.get_or_load("nova", Scope::Scenes, || Ok(1u8)).unwrap();
        cache.reset_stats();

        assert_eq!(cache.stats().total_requests, 0);
        cache.get_or_load("nova", Scope::Scenes, || Ok(2u8)).unwrap();
        assert_eq!(cache.stats().hits, 1);
    }
}
