//! 피드 파이프라인 컨텍스트.
//!
//! 캐시, 저장소, 오케스트레이터를 한 번만 만들어 소비자에게 하나의 진입점으로
//! 제공합니다. 여러 컨텍스트를 만들면 각각 독립된 캐시와 루프를 가집니다.

use std::sync::Arc;
use std::time::Duration;

use feed_core::{DataKind, DataRequest, FeedConfig, MarketData, Result};
use tracing::{debug, info};

use crate::cache::{CacheStats, TtlCache};
use crate::orchestrator::{
    FeedUpdate, OrchestratorConfig, PollingOrchestrator, SubscriptionHandle, SubscriptionState,
};
use crate::provider::MarketDataFetcher;
use crate::repository::DataRepository;

/// 피드 파이프라인 컨텍스트.
#[derive(Clone)]
pub struct FeedContext {
    config: Arc<FeedConfig>,
    cache: Arc<TtlCache<MarketData>>,
    repository: Arc<DataRepository>,
    orchestrator: PollingOrchestrator,
}

impl FeedContext {
    /// 설정을 검증하고 컨텍스트를 구성합니다.
    pub fn new(config: FeedConfig, fetcher: Arc<dyn MarketDataFetcher>) -> Result<Self> {
        config.validate()?;

        let cache = Arc::new(TtlCache::new(config.cache.clone()));
        let repository = Arc::new(DataRepository::new(
            cache.clone(),
            fetcher.clone(),
            config.cache.clone(),
        ));
        let orchestrator =
            PollingOrchestrator::new(repository.clone(), OrchestratorConfig::from(&config));

        info!(
            fetcher = fetcher.name(),
            batch_size = config.batch_size,
            max_retries = config.max_retries,
            "피드 컨텍스트 초기화"
        );

        Ok(Self {
            config: Arc::new(config),
            cache,
            repository,
            orchestrator,
        })
    }

    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    pub fn repository(&self) -> &Arc<DataRepository> {
        &self.repository
    }

    pub fn orchestrator(&self) -> &PollingOrchestrator {
        &self.orchestrator
    }

    // =========================================================================
    // 구독
    // =========================================================================

    /// 주기적 갱신을 구독합니다.
    pub fn subscribe<F>(
        &self,
        symbols: &[String],
        kind: DataKind,
        interval: Duration,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        F: Fn(FeedUpdate) + Send + Sync + 'static,
    {
        self.orchestrator.subscribe(symbols, kind, interval, callback)
    }

    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.orchestrator.unsubscribe(handle)
    }

    pub fn pause(&self, handle: &SubscriptionHandle) -> bool {
        self.orchestrator.pause(handle)
    }

    pub fn resume(&self, handle: &SubscriptionHandle) -> bool {
        self.orchestrator.resume(handle)
    }

    pub fn subscription_state(&self, handle: &SubscriptionHandle) -> Option<SubscriptionState> {
        self.orchestrator.subscription_state(handle)
    }

    /// 모든 구독을 해지합니다.
    pub fn shutdown(&self) {
        self.orchestrator.shutdown();
    }

    // =========================================================================
    // 단건 조회
    // =========================================================================

    /// 구독 없이 한 번 조회합니다. 캐시 우선 규칙은 그대로 적용됩니다.
    pub async fn get_once(&self, symbol: &str, request: &DataRequest) -> Result<MarketData> {
        debug!(symbol = symbol, request = ?request, "단건 조회");

        let data = match request {
            DataRequest::Realtime => MarketData::Quote(self.repository.get_realtime(symbol).await?),
            DataRequest::Historical { window } => {
                MarketData::Bars(self.repository.get_historical(symbol, window).await?)
            }
            DataRequest::Fundamentals => {
                MarketData::Fundamentals(self.repository.get_fundamentals(symbol).await?)
            }
            DataRequest::Indicator { request } => {
                MarketData::Indicator(self.repository.get_indicator(symbol, request).await?)
            }
        };
        Ok(data)
    }

    /// 네임스페이스의 캐시 통계.
    pub fn cache_stats(&self, namespace: &str) -> CacheStats {
        self.cache.stats(namespace)
    }

    /// 모든 네임스페이스의 캐시 통계 (이름순).
    pub fn all_cache_stats(&self) -> Vec<(String, CacheStats)> {
        self.cache
            .namespaces()
            .into_iter()
            .map(|ns| {
                let stats = self.cache.stats(&ns);
                (ns, stats)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use feed_core::{FeedError, HistoryWindow, IndicatorSpec};

    fn context(fetcher: Arc<MockFetcher>) -> FeedContext {
        FeedContext::new(FeedConfig::default(), fetcher).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = FeedConfig {
            batch_size: 0,
            ..FeedConfig::default()
        };
        let result = FeedContext::new(config, Arc::new(MockFetcher::new()));
        assert!(matches!(result, Err(FeedError::Config(_))));
    }

    #[tokio::test]
    async fn test_get_once_each_kind() {
        let fetcher = Arc::new(MockFetcher::new());
        let ctx = context(fetcher.clone());

        let quote = ctx.get_once("aapl", &DataRequest::Realtime).await.unwrap();
        assert_eq!(quote.as_quote().map(|q| q.symbol.as_str()), Some("AAPL"));

        let bars = ctx
            .get_once("AAPL", &DataRequest::Historical { window: HistoryWindow::daily(30) })
            .await
            .unwrap();
        assert_eq!(bars.as_bars().map(<[_]>::len), Some(60));

        let fundamentals = ctx.get_once("AAPL", &DataRequest::Fundamentals).await.unwrap();
        assert!(fundamentals.as_fundamentals().is_some());

        let indicator = ctx
            .get_once("AAPL", &DataRequest::Indicator { request: IndicatorSpec::rsi().into() })
            .await
            .unwrap();
        assert!(indicator.as_indicator().is_some());
    }

    #[tokio::test]
    async fn test_cache_stats_track_get_once() {
        let fetcher = Arc::new(MockFetcher::new());
        let ctx = context(fetcher.clone());

        ctx.get_once("AAPL", &DataRequest::Realtime).await.unwrap();
        ctx.get_once("AAPL", &DataRequest::Realtime).await.unwrap();

        let stats = ctx.cache_stats("realtime");
        assert_eq!(stats.size, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(fetcher.realtime_calls(), 1);
        assert_eq!(ctx.all_cache_stats().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_through_context() {
        let ctx = context(Arc::new(MockFetcher::new()));

        let handle = ctx
            .subscribe(&["AAPL".to_string()], DataKind::Realtime, Duration::from_secs(5), |_| {})
            .unwrap();
        assert_eq!(ctx.subscription_state(&handle), Some(SubscriptionState::Registered));

        assert!(ctx.pause(&handle));
        assert_eq!(ctx.subscription_state(&handle), Some(SubscriptionState::Paused));
        assert!(ctx.unsubscribe(&handle));
        assert_eq!(ctx.subscription_state(&handle), None);
        ctx.shutdown();
    }
}
