//! Per-key memoized fetches with caller-chosen freshness.

use crate::error::{Result, StatusError};
use crate::telemetry::traits::DataSource;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// The cached outcome of the most recent fetch for one key.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// Name of the source that produced the value
    pub source: &'static str,
    pub key: K,
    /// `None` when the most recent fetch failed
    pub value: Option<V>,
    /// When the most recent fetch was started
    pub fetched_at: Instant,
    /// TTL requested by the caller that triggered the fetch
    pub ttl: Duration,
}

impl<K, V> CacheEntry<K, V> {
    /// Whether this entry satisfies a caller asking for at most `ttl` of age.
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.fetched_at) < ttl
    }
}

/// Outcome of one fetch, not yet stored.
pub struct Fetched<S: DataSource> {
    pub key: S::Key,
    pub ttl: Duration,
    pub result: Result<S::Value>,
}

/// TTL cache in front of one [`DataSource`].
///
/// The fetch timestamp is shared by all callers of a key while each call
/// brings its own TTL. A failed fetch replaces the previous value with `None`.
///
/// Fetching is split from storing: [`SourceCache::fetch_stale`] returns an
/// owned future that does not borrow the cache, and
/// [`SourceCache::complete`] stores its results. Callers keep at most one
/// such batch in flight per cache, so no key is fetched twice at once.
pub struct SourceCache<S: DataSource> {
    source: Arc<S>,
    entries: HashMap<S::Key, CacheEntry<S::Key, S::Value>>,
    fetch_timeout: Duration,
}

impl<S: DataSource> SourceCache<S> {
    pub fn new(source: S, fetch_timeout: Duration) -> Self {
        Self {
            source: Arc::new(source),
            entries: HashMap::new(),
            fetch_timeout,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Return the value for `key`, fetching first when it is older than `ttl`.
    pub async fn get(&mut self, key: &S::Key, ttl: Duration, now: Instant) -> Option<S::Value> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_fresh(ttl, now) {
                return entry.value.clone();
            }
        }

        let result = fetch_bounded(&*self.source, key, self.fetch_timeout).await;
        self.store(key.clone(), result, ttl, now);
        self.peek(key).cloned()
    }

    /// Fetch every stale key of `requests` concurrently.
    ///
    /// Duplicate keys are fetched once, judged against the shortest TTL asked
    /// for. Returns the number of fetches performed.
    pub async fn refresh(&mut self, requests: &[(S::Key, Duration)], now: Instant) -> usize {
        let wanted = self.stale(requests, now);
        if wanted.is_empty() {
            return 0;
        }
        let fetched = self.fetch_stale(wanted).await;
        self.complete(fetched, now)
    }

    /// The keys of `requests` a refresh at `now` would fetch, deduplicated
    /// with the shortest TTL kept.
    pub fn stale(&self, requests: &[(S::Key, Duration)], now: Instant) -> Vec<(S::Key, Duration)> {
        let mut wanted: Vec<(S::Key, Duration)> = Vec::with_capacity(requests.len());
        for (key, ttl) in requests {
            match wanted.iter_mut().find(|(k, _)| k == key) {
                Some(existing) => existing.1 = existing.1.min(*ttl),
                None => wanted.push((key.clone(), *ttl)),
            }
        }
        wanted.retain(|(key, ttl)| self.is_stale(key, *ttl, now));
        wanted
    }

    /// Fetch `wanted` concurrently, each bounded by the fetch timeout.
    ///
    /// The returned future owns everything it touches; hand its output to
    /// [`SourceCache::complete`].
    pub fn fetch_stale(
        &self,
        wanted: Vec<(S::Key, Duration)>,
    ) -> impl Future<Output = Vec<Fetched<S>>> + Send + 'static {
        let limit = self.fetch_timeout;
        let fetches: Vec<_> = wanted
            .into_iter()
            .map(|(key, ttl)| {
                let source = Arc::clone(&self.source);
                async move {
                    let result = fetch_bounded(&*source, &key, limit).await;
                    Fetched { key, ttl, result }
                }
            })
            .collect();
        join_all(fetches)
    }

    /// Store a batch fetched from `started_at`. Returns the number stored.
    pub fn complete(&mut self, fetched: Vec<Fetched<S>>, started_at: Instant) -> usize {
        let count = fetched.len();
        for Fetched { key, ttl, result } in fetched {
            self.store(key, result, ttl, started_at);
        }
        count
    }

    /// The currently cached value, whatever its age. Never fetches.
    pub fn peek(&self, key: &S::Key) -> Option<&S::Value> {
        self.entries.get(key)?.value.as_ref()
    }

    pub fn entry(&self, key: &S::Key) -> Option<&CacheEntry<S::Key, S::Value>> {
        self.entries.get(key)
    }

    /// Whether a caller asking for `ttl` would trigger a fetch.
    pub fn is_stale(&self, key: &S::Key, ttl: Duration, now: Instant) -> bool {
        self.entries
            .get(key)
            .map_or(true, |entry| !entry.is_fresh(ttl, now))
    }

    /// Drop one entry, or every entry when `key` is `None`.
    pub fn invalidate(&mut self, key: Option<&S::Key>) {
        match key {
            Some(key) => {
                self.entries.remove(key);
            }
            None => self.entries.clear(),
        }
    }

    fn store(&mut self, key: S::Key, result: Result<S::Value>, ttl: Duration, now: Instant) {
        let had_value = self.peek(&key).is_some();
        let value = match result {
            Ok(value) => {
                debug!(source = self.source.name(), key = ?key, "fetched");
                Some(value)
            }
            Err(err) if had_value => {
                warn!(source = self.source.name(), key = ?key, "source unavailable: {}", err);
                None
            }
            Err(err) => {
                debug!(source = self.source.name(), key = ?key, "still unavailable: {}", err);
                None
            }
        };

        self.entries.insert(
            key.clone(),
            CacheEntry {
                source: self.source.name(),
                key,
                value,
                fetched_at: now,
                ttl,
            },
        );
    }
}

async fn fetch_bounded<S: DataSource>(source: &S, key: &S::Key, limit: Duration) -> Result<S::Value> {
    match tokio::time::timeout(limit, source.fetch(key)).await {
        Ok(result) => result,
        Err(_) => Err(StatusError::Timeout(limit)),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Source returning the fetch count as its value, optionally failing or stalling.
    #[derive(Clone, Default)]
    pub(crate) struct CountingSource {
        pub fetches: Arc<AtomicUsize>,
        pub failing: Arc<AtomicBool>,
        pub stall: Option<Duration>,
    }

    impl DataSource for CountingSource {
        type Key = &'static str;
        type Value = usize;

        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, _key: &Self::Key) -> Result<usize> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            if self.failing.load(Ordering::SeqCst) {
                Err(StatusError::command_error("boom"))
            } else {
                Ok(n)
            }
        }
    }

    fn cache(source: CountingSource) -> SourceCache<CountingSource> {
        SourceCache::new(source, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_fetches_once_within_ttl() {
        let source = CountingSource::default();
        let mut cache = cache(source.clone());
        let t0 = Instant::now();
        let ttl = Duration::from_secs(5);

        assert_eq!(cache.get(&"cpu", ttl, t0).await, Some(1));
        assert_eq!(cache.get(&"cpu", ttl, t0 + Duration::from_secs(4)).await, Some(1));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);

        assert_eq!(cache.get(&"cpu", ttl, t0 + Duration::from_secs(5)).await, Some(2));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ttl_is_per_call_but_timestamp_is_shared() {
        let source = CountingSource::default();
        let mut cache = cache(source.clone());
        let t0 = Instant::now();

        cache.get(&"smart", Duration::from_secs(10), t0).await;
        let later = t0 + Duration::from_secs(3);
        // A relaxed caller is satisfied by the shared fetch...
        assert_eq!(cache.get(&"smart", Duration::from_secs(10), later).await, Some(1));
        // ...while a strict caller refetches, which the relaxed caller then sees.
        assert_eq!(cache.get(&"smart", Duration::from_secs(2), later).await, Some(2));
        assert_eq!(cache.get(&"smart", Duration::from_secs(10), later).await, Some(2));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_never_serves_old_value() {
        let source = CountingSource::default();
        let mut cache = cache(source.clone());
        let t0 = Instant::now();
        let ttl = Duration::from_secs(2);

        assert_eq!(cache.get(&"mem", ttl, t0).await, Some(1));
        source.failing.store(true, Ordering::SeqCst);
        assert_eq!(cache.get(&"mem", ttl, t0 + ttl).await, None);
        assert_eq!(cache.peek(&"mem"), None);

        // The failure is remembered for the TTL; no retry storm.
        assert_eq!(cache.get(&"mem", ttl, t0 + ttl + Duration::from_secs(1)).await, None);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let source = CountingSource {
            stall: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let mut cache = cache(source);

        let value = cache.get(&"fs", Duration::from_secs(5), Instant::now()).await;
        assert_eq!(value, None);
        assert!(cache.entry(&"fs").is_some());
    }

    #[tokio::test]
    async fn test_refresh_dedupes_and_skips_fresh_keys() {
        let source = CountingSource::default();
        let mut cache = cache(source.clone());
        let t0 = Instant::now();

        let requests = [
            ("cpu", Duration::from_secs(2)),
            ("cpu", Duration::from_secs(10)),
            ("load", Duration::from_secs(2)),
        ];
        assert_eq!(cache.refresh(&requests, t0).await, 2);
        assert_eq!(cache.refresh(&requests, t0 + Duration::from_secs(1)).await, 0);

        // The shorter TTL of the duplicated key wins.
        assert_eq!(cache.refresh(&requests, t0 + Duration::from_secs(2)).await, 2);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 4);
        assert_eq!(cache.entry(&"cpu").map(|e| e.ttl), Some(Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_owned_batch_leaves_cache_usable() {
        let source = CountingSource {
            stall: Some(Duration::from_millis(500)),
            ..Default::default()
        };
        let mut cache = cache(source.clone());
        let t0 = Instant::now();

        let wanted = cache.stale(&[("net", Duration::from_secs(2))], t0);
        let batch = tokio::spawn(cache.fetch_stale(wanted));
        // Nothing is stored until the batch is completed.
        assert!(cache.entry(&"net").is_none());

        let fetched = batch.await.unwrap();
        assert_eq!(cache.complete(fetched, t0), 1);
        assert_eq!(cache.peek(&"net"), Some(&1));
        assert_eq!(cache.entry(&"net").map(|e| e.fetched_at), Some(t0));
    }

    #[tokio::test]
    async fn test_invalidate_forces_fetch() {
        let source = CountingSource::default();
        let mut cache = cache(source.clone());
        let t0 = Instant::now();
        let ttl = Duration::from_secs(60);

        cache.get(&"ip", ttl, t0).await;
        cache.invalidate(Some(&"ip"));
        assert!(cache.peek(&"ip").is_none());
        assert_eq!(cache.get(&"ip", ttl, t0).await, Some(2));

        cache.invalidate(None);
        assert!(cache.is_stale(&"ip", ttl, t0));
    }
}
