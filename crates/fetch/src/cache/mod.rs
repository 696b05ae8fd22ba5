//! Two-tier response cache.
//!
//! Every entry carries two deadlines:
//!
//! ```text
//! stored_at ──── fresh_until ──────────── usable_until
//!   │   Fresh       │          Stale           │   Missing
//! ```
//!
//! - **Fresh**: served as-is, no provider is touched.
//! - **Stale**: served immediately, the manager refreshes it in the background.
//! - **Missing**: no entry, or the entry is past its hard expiry. Expired
//!   entries are evicted the first time they are observed.
//!
//! Entries are kept in a sharded `DashMap`, so lookups and writes for
//! different keys do not contend on one global lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, warn};
use tokio::time::Instant;

/// Fresh and hard time-to-live for cached responses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CacheTtl {
    fresh: Duration,
    hard: Duration,
}

impl CacheTtl {
    /// Build a TTL pair. A hard TTL shorter than the fresh TTL is clamped up
    /// to the fresh TTL.
    pub fn new(fresh: Duration, hard: Duration) -> Self {
        if hard < fresh {
            warn!(
                "Cache hard TTL {:?} is shorter than fresh TTL {:?}, clamping hard TTL to {:?}",
                hard, fresh, fresh
            );
            return Self { fresh, hard: fresh };
        }
        Self { fresh, hard }
    }

    pub fn fresh(&self) -> Duration {
        self.fresh
    }

    pub fn hard(&self) -> Duration {
        self.hard
    }
}

/// Horizon used for TTLs too long to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `start + ttl`, saturating to [`FAR_FUTURE`] when the sum overflows.
fn deadline_after(start: Instant, ttl: Duration) -> Instant {
    start
        .checked_add(ttl)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

/// Result of a cache lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheLookup<V> {
    Fresh(V),
    Stale(V),
    Missing,
}

impl<V> CacheLookup<V> {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale(_))
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// The cached value for Fresh and Stale lookups.
    pub fn into_value(self) -> Option<V> {
        match self {
            Self::Fresh(value) | Self::Stale(value) => Some(value),
            Self::Missing => None,
        }
    }
}

/// Timestamps of a stored entry, for inspection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct EntryInfo {
    pub stored_at: Instant,
    pub fresh_until: Instant,
    pub usable_until: Instant,
    pub generation: u64,
}

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    info: EntryInfo,
}

/// Keyed store of responses with fresh and hard deadlines.
#[derive(Debug)]
pub struct CacheStore<V> {
    entries: DashMap<String, CacheEntry<V>>,
    ttl: CacheTtl,
    generation: AtomicU64,
}

impl<V: Clone> CacheStore<V> {
    pub fn new(ttl: CacheTtl) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            generation: AtomicU64::new(0),
        }
    }

    /// TTLs applied by [`store`](Self::store).
    pub fn ttl(&self) -> CacheTtl {
        self.ttl
    }

    /// Next write generation. Later generations win over earlier ones.
    pub fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Look up a key, evicting it if it is past its hard expiry.
    pub fn get(&self, key: &str) -> CacheLookup<V> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if now < entry.info.fresh_until {
                return CacheLookup::Fresh(entry.value.clone());
            }
            if now < entry.info.usable_until {
                return CacheLookup::Stale(entry.value.clone());
            }
        } else {
            return CacheLookup::Missing;
        }

        if self
            .entries
            .remove_if(key, |_, entry| now >= entry.info.usable_until)
            .is_some()
        {
            debug!("Cache entry '{}' expired, evicted", key);
        }
        CacheLookup::Missing
    }

    /// Store or replace `key` with explicit TTLs. Always wins over earlier
    /// writes.
    pub fn put(&self, key: impl Into<String>, value: V, fresh_ttl: Duration, hard_ttl: Duration) {
        let generation = self.next_generation();
        self.write(
            key.into(),
            value,
            CacheTtl::new(fresh_ttl, hard_ttl),
            generation,
        );
    }

    /// Store `key` with the configured TTLs unless a newer generation has
    /// already written it. Returns whether the value was stored.
    pub fn store(&self, key: impl Into<String>, value: V, generation: u64) -> bool {
        self.write(key.into(), value, self.ttl, generation)
    }

    fn write(&self, key: String, value: V, ttl: CacheTtl, generation: u64) -> bool {
        let stored_at = Instant::now();
        let fresh_until = deadline_after(stored_at, ttl.fresh);
        let entry = CacheEntry {
            value,
            info: EntryInfo {
                stored_at,
                fresh_until,
                usable_until: deadline_after(stored_at, ttl.hard).max(fresh_until),
                generation,
            },
        };

        match self.entries.entry(key) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().info.generation > generation {
                    debug!(
                        "Cache entry '{}' already holds generation {}, dropping generation {}",
                        occupied.key(),
                        occupied.get().info.generation,
                        generation
                    );
                    return false;
                }
                occupied.insert(entry);
            }
            Entry::Vacant(vacant) => {
                vacant.insert(entry);
            }
        }
        true
    }

    /// Remove `key`. Returns whether an entry was present.
    pub fn evict(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        self.entries.get(key).map(|entry| entry.info)
    }

    /// Drop every entry past its hard expiry.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.info.usable_until);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, including expired ones not yet observed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
