use crate::core::cache::KeyValueCollection;
use crate::core::market::{
    Bar, BarInterval, BarRange, FundamentalsSnapshot, MarketDataProvider, QuoteSnapshot,
};
use crate::core::ticker::Ticker;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Staleness window per kind of market data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheTtls {
    pub quote: Duration,
    pub fundamentals: Duration,
    pub bars: Duration,
    /// Upper bound for how long a failed fetch is remembered.
    pub failure: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(60),
            fundamentals: Duration::from_secs(6 * 60 * 60),
            bars: Duration::from_secs(60),
            failure: Duration::from_secs(60),
        }
    }
}

/// Serves market data from TTL collections keyed by `(kind, ticker)`,
/// fetching from `inner` only once an entry is missing or expired.
/// Failures are remembered too, so repeated reads within a window are
/// idempotent.
pub struct CachingMarketData<T: MarketDataProvider> {
    inner: T,
    fast: Arc<dyn KeyValueCollection>,
    slow: Arc<dyn KeyValueCollection>,
    ttls: CacheTtls,
}

impl<T: MarketDataProvider> CachingMarketData<T> {
    /// `fast` holds quotes and bars, `slow` holds fundamentals.
    pub fn new(
        inner: T,
        fast: Arc<dyn KeyValueCollection>,
        slow: Arc<dyn KeyValueCollection>,
        ttls: CacheTtls,
    ) -> Self {
        Self {
            inner,
            fast,
            slow,
            ttls,
        }
    }

    #[cfg(test)]
    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn cached<V, F, Fut>(
        &self,
        collection: &dyn KeyValueCollection,
        key: String,
        ttl: Duration,
        fetch: F,
    ) -> Result<V>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V>> + Send,
    {
        if let Some(bytes) = collection.get(key.as_bytes()).await {
            match serde_json::from_slice::<Result<V, String>>(&bytes) {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(message)) => return Err(anyhow!(message)),
                Err(e) => debug!("Discarding unreadable cache entry {}: {}", key, e),
            }
        }

        let result = fetch().await;
        let (encoded, ttl) = match &result {
            Ok(value) => (serde_json::to_vec(&Ok::<&V, String>(value)), ttl),
            Err(e) => (
                serde_json::to_vec(&Err::<&V, String>(format!("{e:#}"))),
                ttl.min(self.ttls.failure),
            ),
        };
        match encoded {
            Ok(bytes) => collection.put(key.as_bytes(), &bytes, Some(ttl)).await,
            Err(e) => debug!("Failed to encode cache entry {}: {}", key, e),
        }
        result
    }
}

#[async_trait]
impl<T: MarketDataProvider> MarketDataProvider for CachingMarketData<T> {
    async fn quote_snapshot(&self, ticker: &Ticker) -> Result<QuoteSnapshot> {
        self.cached(
            self.fast.as_ref(),
            format!("quote:{ticker}"),
            self.ttls.quote,
            || self.inner.quote_snapshot(ticker),
        )
        .await
    }

    async fn fundamentals_snapshot(&self, ticker: &Ticker) -> Result<FundamentalsSnapshot> {
        self.cached(
            self.slow.as_ref(),
            format!("fundamentals:{ticker}"),
            self.ttls.fundamentals,
            || self.inner.fundamentals_snapshot(ticker),
        )
        .await
    }

    async fn recent_bars(
        &self,
        ticker: &Ticker,
        range: BarRange,
        interval: BarInterval,
    ) -> Result<Vec<Bar>> {
        self.cached(
            self.fast.as_ref(),
            format!("bars:{ticker}:{range}:{interval}"),
            self.ttls.bars,
            || self.inner.recent_bars(ticker, range, interval),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::market::mock::StaticMarketData;
    use crate::store::memory::MemoryCollection;
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use tokio::time::sleep;

    fn caching(market: StaticMarketData, ttls: CacheTtls) -> CachingMarketData<StaticMarketData> {
        CachingMarketData::new(
            market,
            Arc::new(MemoryCollection::new()),
            Arc::new(MemoryCollection::new()),
            ttls,
        )
    }

    fn ticker(symbol: &str) -> Ticker {
        symbol.parse().unwrap()
    }

    #[tokio::test]
    async fn test_reads_within_window_do_not_refetch() {
        let market = StaticMarketData::default()
            .with_quote("LRGC", json!({"regularMarketPrice": 42.0}))
            .with_fundamentals("LRGC", json!({"sharesOutstanding": 1000}));
        let provider = caching(market, CacheTtls::default());

        let first = provider.quote_snapshot(&ticker("LRGC")).await.unwrap();
        let second = provider.quote_snapshot(&ticker("LRGC")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(provider.inner().quote_calls.load(Ordering::SeqCst), 1);

        provider.fundamentals_snapshot(&ticker("LRGC")).await.unwrap();
        provider.fundamentals_snapshot(&ticker("LRGC")).await.unwrap();
        assert_eq!(provider.inner().fundamentals_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let market =
            StaticMarketData::default().with_quote("LRGC", json!({"regularMarketPrice": 42.0}));
        let ttls = CacheTtls {
            quote: Duration::from_millis(10),
            ..CacheTtls::default()
        };
        let provider = caching(market, ttls);

        provider.quote_snapshot(&ticker("LRGC")).await.unwrap();
        sleep(Duration::from_millis(20)).await;
        provider.quote_snapshot(&ticker("LRGC")).await.unwrap();
        assert_eq!(provider.inner().quote_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failures_are_remembered_for_the_failure_window() {
        let ttls = CacheTtls {
            failure: Duration::from_millis(10),
            ..CacheTtls::default()
        };
        let provider = caching(StaticMarketData::default(), ttls);

        let first = provider.fundamentals_snapshot(&ticker("HIDV")).await;
        let second = provider.fundamentals_snapshot(&ticker("HIDV")).await;
        assert!(first.is_err());
        assert_eq!(
            second.unwrap_err().to_string(),
            "No fundamentals for HIDV"
        );
        assert_eq!(provider.inner().fundamentals_calls.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(20)).await;
        let _ = provider.fundamentals_snapshot(&ticker("HIDV")).await;
        assert_eq!(provider.inner().fundamentals_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_bars_are_keyed_by_interval() {
        let market = StaticMarketData::default().with_bars("ILOW", &[Some(20.0), Some(21.0)]);
        let provider = caching(market, CacheTtls::default());
        let ilow = ticker("ILOW");

        let bars = provider
            .recent_bars(&ilow, BarRange::OneDay, BarInterval::OneMinute)
            .await
            .unwrap();
        assert_eq!(bars.len(), 2);
        provider
            .recent_bars(&ilow, BarRange::OneDay, BarInterval::OneMinute)
            .await
            .unwrap();
        provider
            .recent_bars(&ilow, BarRange::OneDay, BarInterval::OneDay)
            .await
            .unwrap();
        assert_eq!(provider.inner().bars_calls.load(Ordering::SeqCst), 2);
    }
}
