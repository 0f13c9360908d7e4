//! Detail view cache
//!
//! A time-expiring, in-process mapping from external item identifier to
//! the rendered detail aggregate (catalog metadata snapshot + joined
//! reviews). Entries live for a fixed TTL from population and can be
//! explicitly invalidated earlier; every review create/delete for an item
//! must invalidate its entry before the mutating request completes, so
//! the next read repopulates from current data.
//!
//! The cache is an injectable service owned by the application state, not
//! a process-wide singleton. Time is read through the `Clock` trait so
//! tests can drive expiry deterministically. Values are stored as
//! immutable `Arc` snapshots: a read racing an invalidation observes the
//! old snapshot or a miss, never a torn entry.

use crate::catalog::TitleMetadata;
use crate::db::ReviewWithAuthor;
use crate::errors::Result;
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// The enriched, cacheable aggregate for one item identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailView {
    /// Catalog metadata snapshot at population time
    pub metadata: TitleMetadata,

    /// Reviews joined with their authors, most recent first
    pub reviews: Vec<ReviewWithAuthor>,
}

/// Time source for entry expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry {
    value: Arc<DetailView>,
    expires_at: Instant,
}

/// In-process detail view cache with TTL and explicit invalidation
pub struct DetailCache {
    entries: RwLock<HashMap<String, Entry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl DetailCache {
    /// Create a cache with the given TTL against the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    /// Create a cache with an injected clock (deterministic in tests)
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            clock,
        }
    }

    /// Get a live entry, treating an expired one as a miss
    pub async fn get(&self, item_id: &str) -> Option<Arc<DetailView>> {
        let now = self.clock.now();

        {
            let entries = self.entries.read().await;
            match entries.get(item_id) {
                Some(entry) if entry.expires_at > now => {
                    debug!(item_id, "Detail cache hit");
                    metrics::record_cache(true, "detail");
                    return Some(Arc::clone(&entry.value));
                }
                Some(_) => {}
                None => {
                    debug!(item_id, "Detail cache miss");
                    metrics::record_cache(false, "detail");
                    return None;
                }
            }
        }

        // Expired: drop it so the map does not accumulate dead entries
        let mut entries = self.entries.write().await;
        if entries
            .get(item_id)
            .is_some_and(|entry| entry.expires_at <= now)
        {
            entries.remove(item_id);
        }

        debug!(item_id, "Detail cache miss (expired)");
        metrics::record_cache(false, "detail");
        None
    }

    /// Store a freshly populated view with a full TTL
    pub async fn insert(&self, item_id: &str, view: DetailView) -> Arc<DetailView> {
        let value = Arc::new(view);
        let expires_at = self.clock.now() + self.ttl;

        let mut entries = self.entries.write().await;
        entries.insert(
            item_id.to_string(),
            Entry {
                value: Arc::clone(&value),
                expires_at,
            },
        );

        debug!(item_id, ttl_secs = self.ttl.as_secs(), "Detail cache set");
        value
    }

    /// Remove any entry for the key; idempotent, missing keys are a no-op
    ///
    /// Returns whether an entry was present. The `Result` is part of the
    /// invalidation contract: callers must treat a failure as a logged
    /// correctness warning, not as grounds to roll back a committed write.
    pub async fn invalidate(&self, item_id: &str) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let removed = entries.remove(item_id).is_some();
        metrics::record_invalidation("detail");
        debug!(item_id, removed, "Detail cache invalidate");
        Ok(removed)
    }

    /// Drop all expired entries, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of live-or-expired entries currently held
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get a live entry or run the populate function
    ///
    /// A populate result of `Ok(None)` (upstream reported no data) or
    /// `Err` is returned as-is and never cached, so negative and error
    /// results do not shadow later successful lookups.
    pub async fn get_or_populate<F, Fut>(
        &self,
        item_id: &str,
        populate: F,
    ) -> Result<Option<Arc<DetailView>>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<DetailView>>>,
    {
        if let Some(cached) = self.get(item_id).await {
            return Ok(Some(cached));
        }

        match populate().await? {
            Some(view) => Ok(Some(self.insert(item_id, view).await)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;
    use std::sync::Mutex;

    /// Manually advanced clock for deterministic expiry tests
    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    fn metadata(imdb_id: &str) -> TitleMetadata {
        TitleMetadata {
            title: "The Shawshank Redemption".to_string(),
            imdb_id: imdb_id.to_string(),
            year: Some("1994".to_string()),
            genre: None,
            director: None,
            plot: None,
            poster: None,
            imdb_rating: None,
        }
    }

    fn view(imdb_id: &str) -> DetailView {
        DetailView {
            metadata: metadata(imdb_id),
            reviews: Vec::new(),
        }
    }

    fn day_cache(clock: Arc<ManualClock>) -> DetailCache {
        DetailCache::with_clock(Duration::from_secs(86_400), clock)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = DetailCache::new(Duration::from_secs(60));
        assert!(cache.get("tt0111161").await.is_none());

        cache.insert("tt0111161", view("tt0111161")).await;
        let hit = cache.get("tt0111161").await.unwrap();
        assert_eq!(hit.metadata.imdb_id, "tt0111161");
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = day_cache(Arc::clone(&clock));

        cache.insert("tt0111161", view("tt0111161")).await;
        clock.advance(Duration::from_secs(86_399));
        assert!(cache.get("tt0111161").await.is_some());

        clock.advance(Duration::from_secs(2));
        assert!(cache.get("tt0111161").await.is_none());
        // The expired entry was dropped, not just hidden
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_is_idempotent() {
        let cache = DetailCache::new(Duration::from_secs(60));
        cache.insert("tt0111161", view("tt0111161")).await;

        assert!(cache.invalidate("tt0111161").await.unwrap());
        assert!(cache.get("tt0111161").await.is_none());

        // Second invalidation of the same key is a no-op, not an error
        assert!(!cache.invalidate("tt0111161").await.unwrap());
        assert!(!cache.invalidate("never-cached").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_or_populate_caches_success() {
        let cache = DetailCache::new(Duration::from_secs(60));

        let populated = cache
            .get_or_populate("tt0111161", || async { Ok(Some(view("tt0111161"))) })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(populated.metadata.imdb_id, "tt0111161");

        // Second call must not re-run the populate function
        let cached = cache
            .get_or_populate("tt0111161", || async {
                panic!("populate must not run on a live entry")
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(*cached, *populated);
    }

    #[tokio::test]
    async fn test_get_or_populate_does_not_cache_no_data() {
        let cache = DetailCache::new(Duration::from_secs(60));

        let missing = cache
            .get_or_populate("tt0000000", || async { Ok(None) })
            .await
            .unwrap();
        assert!(missing.is_none());
        assert!(cache.is_empty().await);

        // A later successful lookup is not shadowed
        let found = cache
            .get_or_populate("tt0000000", || async { Ok(Some(view("tt0000000"))) })
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_get_or_populate_does_not_cache_errors() {
        let cache = DetailCache::new(Duration::from_secs(60));

        let result = cache
            .get_or_populate("tt0111161", || async {
                Err(AppError::CatalogUnavailable {
                    message: "timeout".to_string(),
                })
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_then_repopulate_sees_new_data() {
        let cache = DetailCache::new(Duration::from_secs(60));

        let stale = DetailView {
            metadata: metadata("tt0111161"),
            reviews: Vec::new(),
        };
        cache.insert("tt0111161", stale).await;

        // A review mutation invalidates before the request completes
        cache.invalidate("tt0111161").await.unwrap();

        let mut fresh = view("tt0111161");
        fresh.metadata.plot = Some("Two imprisoned men bond over a number of years.".to_string());
        let repopulated = cache
            .get_or_populate("tt0111161", || async { Ok(Some(fresh)) })
            .await
            .unwrap()
            .unwrap();
        assert!(repopulated.metadata.plot.is_some());
    }

    #[tokio::test]
    async fn test_review_lifecycle_coherence() {
        use crate::db::models::{Review, User};

        let cache = DetailCache::new(Duration::from_secs(86_400));
        let store: Arc<Mutex<Vec<ReviewWithAuthor>>> = Arc::new(Mutex::new(Vec::new()));

        let populate = |store: Arc<Mutex<Vec<ReviewWithAuthor>>>| {
            move || async move {
                Ok(Some(DetailView {
                    metadata: metadata("tt0111161"),
                    reviews: store.lock().unwrap().clone(),
                }))
            }
        };

        // First fetch populates an empty joined list
        let initial = cache
            .get_or_populate("tt0111161", populate(Arc::clone(&store)))
            .await
            .unwrap()
            .unwrap();
        assert!(initial.reviews.is_empty());

        // A submission commits to the store, then invalidates
        let author = User {
            id: uuid::Uuid::new_v4(),
            username: "ellis".to_string(),
            email: "ellis@example.com".to_string(),
            password_hash: "hash".to_string(),
            is_admin: false,
            created_at: chrono::DateTime::UNIX_EPOCH.into(),
        };
        let review = Review {
            id: uuid::Uuid::new_v4(),
            user_id: author.id,
            content: "this movie was wonderful".to_string(),
            sentiment: "Positive".to_string(),
            confidence: 0.97,
            imdb_id: Some("tt0111161".to_string()),
            created_at: chrono::DateTime::UNIX_EPOCH.into(),
        };
        store.lock().unwrap().push(ReviewWithAuthor {
            review,
            author,
        });
        cache.invalidate("tt0111161").await.unwrap();

        // The very next fetch must reflect the new review, no stale read
        let after_submit = cache
            .get_or_populate("tt0111161", populate(Arc::clone(&store)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after_submit.reviews.len(), 1);
        assert_eq!(
            after_submit.reviews[0].review.content,
            "this movie was wonderful"
        );

        // Moderation deletes the only review, then invalidates
        store.lock().unwrap().clear();
        cache.invalidate("tt0111161").await.unwrap();

        let after_delete = cache
            .get_or_populate("tt0111161", populate(Arc::clone(&store)))
            .await
            .unwrap()
            .unwrap();
        assert!(after_delete.reviews.is_empty());
        // Catalog metadata still present when the item exists upstream
        assert_eq!(after_delete.metadata.imdb_id, "tt0111161");
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = Arc::new(ManualClock::new());
        let cache = day_cache(Arc::clone(&clock));

        cache.insert("old", view("old")).await;
        clock.advance(Duration::from_secs(86_500));
        cache.insert("new", view("new")).await;

        assert_eq!(cache.purge_expired().await, 1);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("new").await.is_some());
    }

    #[tokio::test]
    async fn test_reads_see_snapshot_or_miss() {
        let cache = Arc::new(DetailCache::new(Duration::from_secs(60)));
        cache.insert("tt0111161", view("tt0111161")).await;

        let reader = Arc::clone(&cache);
        let read = tokio::spawn(async move { reader.get("tt0111161").await });
        cache.invalidate("tt0111161").await.unwrap();

        // Either outcome is acceptable; a present value must be the full
        // snapshot from the original population.
        if let Some(seen) = read.await.unwrap() {
            assert_eq!(seen.metadata.imdb_id, "tt0111161");
        }
    }
}
