//! Short-lived response cache in front of a [`QueryBackend`].
//!
//! Identical queries within the TTL are served from memory. Failures are
//! never cached.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tierboard_core::{
    DailyQuery, FetchError, QuartileResponse, QueryBackend, QueryFilter, RawDailyMetricRow,
    RawDailyQuartileRow,
};
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum CachedResponse {
    Quartiles(QuartileResponse),
    DailyMetric(Vec<RawDailyMetricRow>),
    DailyQuartilePosition(Vec<RawDailyQuartileRow>),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    response: CachedResponse,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

pub struct CachedBackend<B> {
    inner: B,
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

fn cache_key<Q: Serialize>(prefix: &str, query: &Q) -> Result<String, FetchError> {
    let body = serde_json::to_string(query).map_err(|e| FetchError::Decode {
        reason: format!("cache key: {}", e),
    })?;
    Ok(format!("{}:{}", prefix, body))
}

impl<B: QueryBackend> CachedBackend<B> {
    pub fn new(inner: B, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.len(),
        }
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.entries.len())
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    fn lookup(&self, key: &str) -> Option<CachedResponse> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.response.clone());
        match hit {
            Some(response) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(key, "Cache hit");
                Some(response)
            }
            None => {
                self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn store(&self, key: String, response: CachedResponse) {
        self.entries.insert(
            key,
            CacheEntry {
                response,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

#[async_trait]
impl<B: QueryBackend> QueryBackend for CachedBackend<B> {
    async fn fetch_quartiles(&self, filter: &QueryFilter) -> Result<QuartileResponse, FetchError> {
        let key = cache_key("quartiles", filter)?;
        if let Some(CachedResponse::Quartiles(response)) = self.lookup(&key) {
            return Ok(response);
        }
        let response = self.inner.fetch_quartiles(filter).await?;
        self.store(key, CachedResponse::Quartiles(response.clone()));
        Ok(response)
    }

    async fn fetch_daily_metric(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyMetricRow>, FetchError> {
        let key = cache_key("daily_metric", query)?;
        if let Some(CachedResponse::DailyMetric(rows)) = self.lookup(&key) {
            return Ok(rows);
        }
        let rows = self.inner.fetch_daily_metric(query).await?;
        self.store(key, CachedResponse::DailyMetric(rows.clone()));
        Ok(rows)
    }

    async fn fetch_daily_quartile_position(
        &self,
        query: &DailyQuery,
    ) -> Result<Vec<RawDailyQuartileRow>, FetchError> {
        let key = cache_key("daily_quartile_position", query)?;
        if let Some(CachedResponse::DailyQuartilePosition(rows)) = self.lookup(&key) {
            return Ok(rows);
        }
        let rows = self.inner.fetch_daily_quartile_position(query).await?;
        self.store(key, CachedResponse::DailyQuartilePosition(rows.clone()));
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tierboard_core::{parse_date, RawMetricRow};
    use tierboard_test_utils::ScriptedBackend;

    fn response(metric: u64) -> QuartileResponse {
        QuartileResponse {
            quartile1: vec![RawMetricRow::new("10 - Ana", metric)],
            ..QuartileResponse::default()
        }
    }

    fn filter() -> QueryFilter {
        QueryFilter::today(parse_date("2025-06-10").unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_hit_within_ttl() {
        let backend = ScriptedBackend::new();
        backend.push_quartiles(Ok(response(100)));
        backend.push_quartiles(Ok(response(200)));
        let cached = CachedBackend::new(backend, Duration::from_secs(30));

        let first = cached.fetch_quartiles(&filter()).await.unwrap();
        tokio::time::advance(Duration::from_secs(10)).await;
        let second = cached.fetch_quartiles(&filter()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cached.inner().quartile_calls(), 1);
        assert_eq!(cached.stats().hits, 1);
        assert_eq!(cached.stats().misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refetch_after_expiry() {
        let backend = ScriptedBackend::new();
        backend.push_quartiles(Ok(response(100)));
        backend.push_quartiles(Ok(response(200)));
        let cached = CachedBackend::new(backend, Duration::from_secs(30));

        cached.fetch_quartiles(&filter()).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        let second = cached.fetch_quartiles(&filter()).await.unwrap();

        assert_eq!(second, response(200));
        assert_eq!(cached.inner().quartile_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_filters_do_not_share() {
        let backend = ScriptedBackend::new();
        backend.push_quartiles(Ok(response(100)));
        backend.push_quartiles(Ok(response(200)));
        let cached = CachedBackend::new(backend, Duration::from_secs(30));

        cached.fetch_quartiles(&filter()).await.unwrap();
        let all_history = cached
            .fetch_quartiles(&QueryFilter::default())
            .await
            .unwrap();

        assert_eq!(all_history, response(200));
        assert_eq!(cached.stats().entries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_cached() {
        let backend = ScriptedBackend::new();
        backend.push_quartiles(Err(FetchError::Timeout));
        backend.push_quartiles(Ok(response(100)));
        let cached = CachedBackend::new(backend, Duration::from_secs(30));

        assert_eq!(
            cached.fetch_quartiles(&filter()).await,
            Err(FetchError::Timeout)
        );
        assert_eq!(cached.fetch_quartiles(&filter()).await.unwrap(), response(100));
        assert_eq!(cached.stats().entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_expired() {
        let backend = ScriptedBackend::new();
        backend.push_quartiles(Ok(response(100)));
        let cached = CachedBackend::new(backend, Duration::from_secs(5));

        cached.fetch_quartiles(&filter()).await.unwrap();
        assert_eq!(cached.purge_expired(), 0);
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cached.purge_expired(), 1);
        assert_eq!(cached.stats().entries, 0);
    }
}
