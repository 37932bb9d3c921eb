//! Memory store: fingerprinted context retrieval over the cache.
//!
//! Answers "what context is relevant to this sub-query". The store computes
//! a normalized fingerprint for `(query, scope)`, consults the retrieval
//! cache, and only on a miss asks the external [`ContextSource`]
//! collaborator. The external lookup runs outside the cache lock, so
//! lookups for different keys never serialize behind each other.

mod cache;
mod transcript;

pub use cache::{CacheCounters, CacheEntry, RetrievalCache};
pub use transcript::TranscriptSource;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::AppResult;

/// Compute the normalized cache fingerprint for a query within a scope.
///
/// Case-normalized, whitespace-collapsed; two textually sloppy spellings of
/// the same question share one entry.
pub fn fingerprint(query: &str, scope: &str) -> String {
    let normalize = |s: &str| s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ");
    format!("{}::{}", normalize(scope), normalize(query))
}

/// External lookup collaborator. The concrete retrieval/search mechanism
/// lives behind this seam.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Find context relevant to `query` within `scope`, or nothing.
    async fn lookup(&self, query: &str, scope: &str) -> AppResult<Option<String>>;
}

/// Cache-fronted context retrieval.
pub struct MemoryStore {
    cache: RetrievalCache,
    source: Arc<dyn ContextSource>,
}

impl MemoryStore {
    /// Create a store over a cache and an external source.
    pub fn new(cache: RetrievalCache, source: Arc<dyn ContextSource>) -> Self {
        Self { cache, source }
    }

    /// Retrieve context for `(query, scope)`.
    ///
    /// Hit: the cached payload, access time refreshed. Miss: one external
    /// lookup, its result cached (empty results included, so a repeat of
    /// the same query is always a hit), then returned. Empty payloads
    /// surface as `None` either way.
    pub async fn retrieve(&self, query: &str, scope: &str) -> AppResult<Option<String>> {
        let key = fingerprint(query, scope);

        if let Some(value) = self.cache.get(&key) {
            debug!(key = %key, "Context cache hit");
            return Ok(non_empty(value));
        }

        debug!(key = %key, "Context cache miss, performing lookup");
        let payload = self.source.lookup(query, scope).await?;
        self.cache.put(&key, payload.as_deref().unwrap_or(""));

        Ok(payload.and_then(non_empty))
    }

    /// The underlying cache (counters, entry count).
    pub fn cache(&self) -> &RetrievalCache {
        &self.cache
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(source: MockContextSource) -> MemoryStore {
        MemoryStore::new(
            RetrievalCache::new(16, Arc::new(CacheCounters::new())),
            Arc::new(source),
        )
    }

    #[test]
    fn test_fingerprint_normalizes_case_and_whitespace() {
        assert_eq!(
            fingerprint("What   Changed\tlast week?", "Meeting"),
            fingerprint("what changed last week?", "meeting")
        );
    }

    #[test]
    fn test_fingerprint_separates_scopes() {
        assert_ne!(fingerprint("same query", "a"), fingerprint("same query", "b"));
    }

    #[tokio::test]
    async fn test_miss_then_hit_single_lookup() {
        let mut source = MockContextSource::new();
        source
            .expect_lookup()
            .times(1)
            .returning(|_, _| Ok(Some("relevant lines".to_string())));
        let store = store_with(source);

        let first = store.retrieve("what changed?", "doc").await.unwrap();
        let second = store.retrieve("What  changed?", "doc").await.unwrap();

        assert_eq!(first.as_deref(), Some("relevant lines"));
        assert_eq!(second.as_deref(), Some("relevant lines"));
        assert_eq!(store.cache().counters().hits(), 1);
        assert_eq!(store.cache().counters().misses(), 1);
        assert_eq!(store.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_lookup_is_cached() {
        let mut source = MockContextSource::new();
        source.expect_lookup().times(1).returning(|_, _| Ok(None));
        let store = store_with(source);

        assert_eq!(store.retrieve("nothing here", "doc").await.unwrap(), None);
        // Second call must hit the cached empty entry, not the source.
        assert_eq!(store.retrieve("nothing here", "doc").await.unwrap(), None);
        assert_eq!(store.cache().counters().hits(), 1);
        assert_eq!(store.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_scopes_distinct_entries() {
        let mut source = MockContextSource::new();
        source
            .expect_lookup()
            .times(2)
            .returning(|_, scope| Ok(Some(format!("context for {}", scope))));
        let store = store_with(source);

        let a = store.retrieve("question", "alpha").await.unwrap();
        let b = store.retrieve("question", "beta").await.unwrap();

        assert_eq!(a.as_deref(), Some("context for alpha"));
        assert_eq!(b.as_deref(), Some("context for beta"));
        assert_eq!(store.cache().len(), 2);
    }
}
