//! Process-local TTL cache in front of a [`ProfileLookup`].
//!
//! Profiles change rarely and the normalizer already tolerates stale or
//! missing display data, so a short TTL is enough. Negative results are
//! cached too: historical content often points at deleted accounts.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::{Profile, ProfileLookup, StoreError};
use crate::metrics::community::{PROFILE_CACHE_EVICTIONS_TOTAL, PROFILE_CACHE_LOOKUPS_TOTAL};

pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct CachedEntry {
    profile: Option<Profile>,
    expires_at: Instant,
}

impl CachedEntry {
    #[inline]
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

pub struct CachedProfileLookup {
    inner: Arc<dyn ProfileLookup>,
    entries: DashMap<Uuid, CachedEntry>,
    ttl: Duration,
    max_entries: usize,
}

impl CachedProfileLookup {
    pub fn new(inner: Arc<dyn ProfileLookup>, ttl: Duration) -> Self {
        Self::with_limit(inner, ttl, DEFAULT_MAX_ENTRIES)
    }

    pub fn with_limit(inner: Arc<dyn ProfileLookup>, ttl: Duration, max_entries: usize) -> Self {
        debug!(ttl_secs = ttl.as_secs(), max_entries, "initializing profile cache");
        Self {
            inner,
            entries: DashMap::new(),
            ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn invalidate(&self, identity: &Uuid) {
        self.evict(identity, "invalidated");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let purged = before.saturating_sub(self.entries.len());
        if purged > 0 {
            PROFILE_CACHE_EVICTIONS_TOTAL
                .with_label_values(&["expired"])
                .inc_by(purged as u64);
        }
    }

    fn evict(&self, identity: &Uuid, reason: &str) {
        if self.entries.remove(identity).is_some() {
            PROFILE_CACHE_EVICTIONS_TOTAL
                .with_label_values(&[reason])
                .inc();
        }
    }

    /// Make room for one more entry. Expired entries go first; if the cache
    /// is still full, an arbitrary tenth of it is dropped.
    fn enforce_limit(&self) {
        if self.entries.len() < self.max_entries {
            return;
        }
        self.purge_expired();
        if self.entries.len() < self.max_entries {
            return;
        }

        let evict_count = (self.entries.len() / 10).max(1);
        warn!(
            entries = self.entries.len(),
            evict_count, "profile cache full, evicting entries"
        );
        let victims: Vec<Uuid> = self
            .entries
            .iter()
            .take(evict_count)
            .map(|entry| *entry.key())
            .collect();
        for identity in victims {
            self.evict(&identity, "capacity");
        }
    }
}

#[async_trait]
impl ProfileLookup for CachedProfileLookup {
    async fn get_profile(&self, identity: Uuid) -> Result<Option<Profile>, StoreError> {
        if let Some(entry) = self.entries.get(&identity) {
            if !entry.is_expired() {
                PROFILE_CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
                return Ok(entry.profile.clone());
            }
            drop(entry);
            self.evict(&identity, "expired");
        }

        PROFILE_CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
        let profile = self.inner.get_profile(identity).await?;
        if !self.ttl.is_zero() {
            debug!(%identity, found = profile.is_some(), "caching profile lookup");
            self.enforce_limit();
            self.entries.insert(
                identity,
                CachedEntry {
                    profile: profile.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProfileLookup for Counting {
        async fn get_profile(&self, identity: Uuid) -> Result<Option<Profile>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Profile {
                identity,
                display_name: Some("Ada".into()),
                avatar_url: None,
                role: Some("Student".into()),
            }))
        }
    }

    #[tokio::test]
    async fn test_second_lookup_is_served_from_cache() {
        let backend = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cache = CachedProfileLookup::new(backend.clone(), Duration::from_secs(60));
        let who = Uuid::new_v4();

        cache.get_profile(who).await.unwrap();
        let cached = cache.get_profile(who).await.unwrap().unwrap();
        assert_eq!(cached.display_name.as_deref(), Some("Ada"));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        cache.invalidate(&who);
        cache.get_profile(who).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_caching() {
        let backend = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cache = CachedProfileLookup::new(backend.clone(), Duration::ZERO);
        let who = Uuid::new_v4();

        cache.get_profile(who).await.unwrap();
        cache.get_profile(who).await.unwrap();
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_entry_count_stays_within_limit() {
        let backend = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cache = CachedProfileLookup::with_limit(backend, Duration::from_secs(60), 100);

        for _ in 0..1_000 {
            cache.get_profile(Uuid::new_v4()).await.unwrap();
        }
        assert!(cache.len() <= 100);
        assert!(!cache.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entries_do_not_accumulate() {
        let backend = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cache = CachedProfileLookup::with_limit(backend, Duration::from_millis(1), 50);

        for _ in 0..500 {
            cache.get_profile(Uuid::new_v4()).await.unwrap();
        }
        assert!(cache.len() <= 50);
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched_and_replaced() {
        let backend = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cache = CachedProfileLookup::new(backend.clone(), Duration::from_millis(1));
        let who = Uuid::new_v4();

        cache.get_profile(who).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.get_profile(who).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }
}
