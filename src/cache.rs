use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::ProxyError;
use crate::metrics::{CACHE_HITS, CACHE_MISSES, CACHE_SIZE, COALESCED_WAITS};
use crate::prompts::Task;

const CONTENT_PREFIX_CHARS: usize = 100;
const PROMPT_PREFIX_CHARS: usize = 50;

/// Fingerprint of a request: the task plus the first 100 characters of the
/// content and the first 50 of the prompt.
///
/// Requests sharing those prefixes map to the same key even when their tails
/// differ.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(task: Task, content: &str, prompt: Option<&str>) -> Self {
        let content_prefix: String = content.chars().take(CONTENT_PREFIX_CHARS).collect();
        let prompt_prefix: String = prompt
            .unwrap_or_default()
            .chars()
            .take(PROMPT_PREFIX_CHARS)
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(task.as_str());
        hasher.update([0u8]);
        hasher.update(&content_prefix);
        hasher.update([0u8]);
        hasher.update(&prompt_prefix);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Cache entry with timestamp
#[derive(Clone)]
pub struct CacheEntry {
    pub data: String,
    pub created_at: Instant,
}

type SharedCall = Shared<BoxFuture<'static, Result<String, ProxyError>>>;

/// Response cache with request coalescing.
///
/// Successful results are kept for `ttl`. While a call for a key is
/// outstanding, later callers with the same key await that call instead of
/// starting their own, so at most one upstream call per key is ever in flight.
pub struct ResponseCache {
    entries: DashMap<CacheKey, CacheEntry>,
    in_flight: DashMap<CacheKey, SharedCall>,
    ttl: Duration,
    capacity: usize,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            in_flight: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Returns the cached result for `key`, joins the in-flight call for it,
    /// or starts `fetch` as the new in-flight call.
    ///
    /// A failed call is not cached and not retried here; every waiter gets
    /// the same error and the next caller starts afresh.
    pub async fn get_or_fetch<F, Fut>(self: &Arc<Self>, key: CacheKey, fetch: F) -> Result<String, ProxyError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, ProxyError>> + Send + 'static,
    {
        // check cache first
        if let Some(data) = self.lookup(&key) {
            CACHE_HITS.inc();
            tracing::debug!(key = key.as_str(), "cache hit");
            return Ok(data);
        }

        let (call, leader) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                COALESCED_WAITS.inc();
                tracing::debug!(key = key.as_str(), "joining in-flight call");
                (entry.get().clone(), false)
            }
            Entry::Vacant(slot) => {
                // a call may have settled between the lookup and taking the slot
                if let Some(data) = self.lookup(&key) {
                    CACHE_HITS.inc();
                    return Ok(data);
                }
                CACHE_MISSES.inc();
                tracing::debug!(key = key.as_str(), "cache miss, calling upstream");
                let call = self.start_call(key, fetch());
                slot.insert(call.clone());
                (call, true)
            }
        };

        if leader {
            // keeps the call running even if every requester goes away
            tokio::spawn(call.clone());
        }
        call.await
    }

    fn start_call<Fut>(self: &Arc<Self>, key: CacheKey, fetch: Fut) -> SharedCall
    where
        Fut: Future<Output = Result<String, ProxyError>> + Send + 'static,
    {
        let cache = Arc::clone(self);
        async move {
            let result = fetch.await;
            if let Ok(data) = &result {
                cache.store(key.clone(), data.clone());
            }
            cache.in_flight.remove(&key);
            result
        }
        .boxed()
        .shared()
    }

    /// Fresh cached data for `key`. Stale entries are dropped on the way.
    pub fn lookup(&self, key: &CacheKey) -> Option<String> {
        if let Some(entry) = self.entries.get(key) {
            if entry.created_at.elapsed() < self.ttl {
                return Some(entry.data.clone());
            }
        }
        if self
            .entries
            .remove_if(key, |_, entry| entry.created_at.elapsed() >= self.ttl)
            .is_some()
        {
            CACHE_SIZE.set(self.entries.len() as f64);
        }
        None
    }

    pub fn store(&self, key: CacheKey, data: String) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            self.make_room();
        }
        self.entries.insert(
            key,
            CacheEntry {
                data,
                created_at: Instant::now(),
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    // drop expired entries, then the oldest one if still full
    fn make_room(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.created_at.elapsed() < self.ttl);
        let expired = before - self.entries.len();

        if self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.created_at)
                .map(|entry| entry.key().clone());
            if let Some(key) = oldest {
                self.entries.remove(&key);
            }
        }
        tracing::debug!(expired, size = self.entries.len(), "evicted cache entries");
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    const TTL: Duration = Duration::from_secs(600);

    fn key(content: &str) -> CacheKey {
        CacheKey::new(Task::Summarize, content, None)
    }

    // fetch that counts invocations and answers after a short delay
    fn counting_fetch(
        calls: &Arc<AtomicUsize>,
        result: Result<String, ProxyError>,
    ) -> impl FnOnce() -> BoxFuture<'static, Result<String, ProxyError>> {
        let calls = Arc::clone(calls);
        move || {
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_millis(50)).await;
                result
            }
            .boxed()
        }
    }

    #[test]
    fn key_uses_prefixes_only() {
        let base = "a".repeat(100);
        let a = CacheKey::new(Task::Quiz, &format!("{base}tail one"), Some("same"));
        let b = CacheKey::new(Task::Quiz, &format!("{base}tail two"), Some("same"));
        assert_eq!(a, b);

        let long_prompt = "p".repeat(50);
        let c = CacheKey::new(Task::AskDoubt, "x", Some(&format!("{long_prompt}1")));
        let d = CacheKey::new(Task::AskDoubt, "x", Some(&format!("{long_prompt}2")));
        assert_eq!(c, d);
    }

    #[test]
    fn key_separates_task_and_fields() {
        assert_ne!(
            CacheKey::new(Task::Quiz, "notes", None),
            CacheKey::new(Task::Flashcards, "notes", None)
        );
        assert_ne!(
            CacheKey::new(Task::AskDoubt, "ab", Some("c")),
            CacheKey::new(Task::AskDoubt, "a", Some("bc"))
        );
        assert_eq!(
            CacheKey::new(Task::Summarize, "x", None),
            CacheKey::new(Task::Summarize, "x", Some(""))
        );
    }

    #[tokio::test]
    async fn second_call_within_ttl_is_served_from_cache() {
        let cache = Arc::new(ResponseCache::new(TTL, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        let first = cache
            .get_or_fetch(key("notes"), counting_fetch(&calls, Ok("summary".to_string())))
            .await
            .unwrap();
        let second = cache
            .get_or_fetch(key("notes"), counting_fetch(&calls, Ok("different".to_string())))
            .await
            .unwrap();

        assert_eq!(first, "summary");
        assert_eq!(second, "summary");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_in_flight(&key("notes")));
    }

    #[tokio::test]
    async fn concurrent_identical_calls_share_one_fetch() {
        let cache = Arc::new(ResponseCache::new(TTL, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_fetch(key("notes"), counting_fetch(&calls, Ok("one".to_string()))),
            cache.get_or_fetch(key("notes"), counting_fetch(&calls, Ok("two".to_string()))),
        );

        assert_eq!(a.unwrap(), "one");
        assert_eq!(b.unwrap(), "one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn shared_failure_reaches_every_waiter_and_is_not_cached() {
        let cache = Arc::new(ResponseCache::new(TTL, 100));
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = Err(ProxyError::Network("connection reset".to_string()));

        let (a, b) = tokio::join!(
            cache.get_or_fetch(key("notes"), counting_fetch(&calls, failure.clone())),
            cache.get_or_fetch(key("notes"), counting_fetch(&calls, failure.clone())),
        );
        assert!(matches!(a, Err(ProxyError::Network(ref m)) if m == "connection reset"));
        assert!(matches!(b, Err(ProxyError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!cache.is_in_flight(&key("notes")));
        assert_eq!(cache.len(), 0);

        // next caller starts a fresh attempt
        let retry = cache
            .get_or_fetch(key("notes"), counting_fetch(&calls, Ok("recovered".to_string())))
            .await
            .unwrap();
        assert_eq!(retry, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_keys_do_not_coalesce() {
        let cache = Arc::new(ResponseCache::new(TTL, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.get_or_fetch(key("biology"), counting_fetch(&calls, Ok("bio".to_string()))),
            cache.get_or_fetch(key("history"), counting_fetch(&calls, Ok("hist".to_string()))),
        );
        assert_eq!(a.unwrap(), "bio");
        assert_eq!(b.unwrap(), "hist");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn abandoned_call_still_populates_cache() {
        let cache = Arc::new(ResponseCache::new(TTL, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        let request = cache.get_or_fetch(key("notes"), counting_fetch(&calls, Ok("late".to_string())));
        // requester gives up before the upstream answers
        let _ = tokio::time::timeout(Duration::from_millis(10), request).await;
        assert!(cache.is_in_flight(&key("notes")));

        sleep(Duration::from_millis(100)).await;
        assert!(!cache.is_in_flight(&key("notes")));
        assert_eq!(cache.lookup(&key("notes")).as_deref(), Some("late"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = Arc::new(ResponseCache::new(TTL, 100));
        cache.store(key("notes"), "old".to_string());

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(cache.lookup(&key("notes")).as_deref(), Some("old"));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.lookup(&key("notes")), None);
        assert_eq!(cache.len(), 0);

        let calls = Arc::new(AtomicUsize::new(0));
        let fresh = cache
            .get_or_fetch(key("notes"), counting_fetch(&calls, Ok("new".to_string())))
            .await
            .unwrap();
        assert_eq!(fresh, "new");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_oldest_entry() {
        let cache = ResponseCache::new(TTL, 2);
        cache.store(key("first"), "1".to_string());
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.store(key("second"), "2".to_string());
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.store(key("third"), "3".to_string());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&key("first")), None);
        assert_eq!(cache.lookup(&key("second")).as_deref(), Some("2"));
        assert_eq!(cache.lookup(&key("third")).as_deref(), Some("3"));

        // overwriting an existing key never evicts
        cache.store(key("third"), "3b".to_string());
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.lookup(&key("second")).as_deref(), Some("2"));
    }
}
