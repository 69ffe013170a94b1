//! 캐시 우선(cache-aside) 데이터 저장소.
//!
//! 도메인 요청("X의 실시간 시세", "X의 최근 N일 캔들")을 캐시 조회와 fetch
//! 협력자 호출로 변환하고, 결과를 표준 타입으로 정규화합니다.
//!
//! # 동작 흐름
//!
//! ```text
//! 요청 (kind, symbol, params)
//!         │
//! ┌───────▼────────┐
//! │ 1. 캐시 조회    │ ← 종류별 신선도 이내인가?
//! └───────┬────────┘
//!     HIT │ MISS
//!         │   │
//!         │ ┌─▼──────────────┐
//!         │ │ 2. fetch 협력자 │
//!         │ └─┬──────────┬───┘
//!         │ 성공│          │실패
//!         │ ┌─▼──────┐ ┌─▼──────────────────┐
//!         │ │캐시 저장│ │3. stale 캐시 대체   │ ← 나이 무제한 조회
//!         │ └─┬──────┘ └─┬──────────────────┘
//!         ▼   ▼          ▼ (없으면 에러 전파)
//!      ┌──────────────────┐
//!      │ 4. 반환           │
//!      └──────────────────┘
//! ```
//!
//! # 캐시 키
//!
//! | 네임스페이스 | 키 |
//! |-------------|-----|
//! | `realtime` | `AAPL` |
//! | `historical` | `AAPL:1d:30` |
//! | `fundamentals` | `AAPL` |
//! | `indicators` | `AAPL:rsi(14):1d:180` |

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use feed_analytics::IndicatorEngine;
use feed_core::{
    normalize_symbol, symbol_set, Bar, CacheConfig, DataKind, FeedError, Fundamentals,
    HistoryWindow, IndicatorRequest, IndicatorSeries, IndicatorSource, MarketData, Quote, Result,
    SymbolSet,
};
use futures::future::join_all;
use tracing::{debug, instrument, warn};

use crate::cache::{MaxAge, TtlCache};
use crate::provider::MarketDataFetcher;

/// 지표 캐시 네임스페이스.
pub const INDICATOR_NAMESPACE: &str = "indicators";

/// `MarketData`로 캐시에 저장되는 값.
trait Cached: Sized + Clone {
    fn into_market_data(self) -> MarketData;
    fn from_market_data(data: MarketData) -> Option<Self>;
}

impl Cached for Quote {
    fn into_market_data(self) -> MarketData {
        MarketData::Quote(self)
    }

    fn from_market_data(data: MarketData) -> Option<Self> {
        match data {
            MarketData::Quote(quote) => Some(quote),
            _ => None,
        }
    }
}

impl Cached for Vec<Bar> {
    fn into_market_data(self) -> MarketData {
        MarketData::Bars(self)
    }

    fn from_market_data(data: MarketData) -> Option<Self> {
        match data {
            MarketData::Bars(bars) => Some(bars),
            _ => None,
        }
    }
}

impl Cached for Fundamentals {
    fn into_market_data(self) -> MarketData {
        MarketData::Fundamentals(self)
    }

    fn from_market_data(data: MarketData) -> Option<Self> {
        match data {
            MarketData::Fundamentals(fundamentals) => Some(fundamentals),
            _ => None,
        }
    }
}

impl Cached for IndicatorSeries {
    fn into_market_data(self) -> MarketData {
        MarketData::Indicator(self)
    }

    fn from_market_data(data: MarketData) -> Option<Self> {
        match data {
            MarketData::Indicator(series) => Some(series),
            _ => None,
        }
    }
}

/// 캐시 우선 데이터 저장소.
pub struct DataRepository {
    cache: Arc<TtlCache<MarketData>>,
    fetcher: Arc<dyn MarketDataFetcher>,
    engine: IndicatorEngine,
    config: CacheConfig,
}

impl DataRepository {
    /// 새로운 저장소 생성.
    pub fn new(
        cache: Arc<TtlCache<MarketData>>,
        fetcher: Arc<dyn MarketDataFetcher>,
        config: CacheConfig,
    ) -> Self {
        Self {
            cache,
            fetcher,
            engine: IndicatorEngine::new(),
            config,
        }
    }

    /// 공유 캐시.
    pub fn cache(&self) -> &Arc<TtlCache<MarketData>> {
        &self.cache
    }

    /// fetch 협력자.
    pub fn fetcher(&self) -> &Arc<dyn MarketDataFetcher> {
        &self.fetcher
    }

    /// 데이터 종류의 신선도.
    pub fn freshness(&self, kind: DataKind) -> Duration {
        let secs = match kind {
            DataKind::Realtime => self.config.realtime_ttl_secs,
            DataKind::Historical => self.config.historical_ttl_secs,
            DataKind::Fundamentals => self.config.fundamentals_ttl_secs,
        };
        Duration::from_secs(secs)
    }

    fn indicator_freshness(&self) -> Duration {
        Duration::from_secs(self.config.indicator_ttl_secs)
    }

    // =========================================================================
    // 단건 조회
    // =========================================================================

    /// 실시간 시세 조회.
    #[instrument(skip(self))]
    pub async fn get_realtime(&self, symbol: &str) -> Result<Quote> {
        let symbol = checked_symbol(symbol)?;
        let namespace = DataKind::Realtime.namespace();

        self.cache_aside(
            namespace,
            &symbol,
            self.freshness(DataKind::Realtime),
            self.fetcher.fetch_realtime(&symbol),
        )
        .await
    }

    /// 과거 캔들 조회. 결과는 시간 오름차순이며 타임스탬프가 중복되지 않습니다.
    #[instrument(skip(self), fields(window = %window))]
    pub async fn get_historical(&self, symbol: &str, window: &HistoryWindow) -> Result<Vec<Bar>> {
        self.historical_within(symbol, window, self.freshness(DataKind::Historical))
            .await
    }

    /// 펀더멘털 조회.
    #[instrument(skip(self))]
    pub async fn get_fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        self.fundamentals_within(symbol, self.freshness(DataKind::Fundamentals))
            .await
    }

    async fn historical_within(
        &self,
        symbol: &str,
        window: &HistoryWindow,
        freshness: Duration,
    ) -> Result<Vec<Bar>> {
        let symbol = checked_symbol(symbol)?;
        let key = historical_key(&symbol, window);

        let fetch = async {
            let bars = self.fetcher.fetch_historical(&symbol, window).await?;
            Ok(normalize_bars(bars))
        };

        self.cache_aside(DataKind::Historical.namespace(), &key, freshness, fetch)
            .await
    }

    async fn fundamentals_within(&self, symbol: &str, freshness: Duration) -> Result<Fundamentals> {
        let symbol = checked_symbol(symbol)?;

        self.cache_aside(
            DataKind::Fundamentals.namespace(),
            &symbol,
            freshness,
            self.fetcher.fetch_fundamentals(&symbol),
        )
        .await
    }

    /// 지표 조회.
    ///
    /// 서버 지표를 우선 사용하고, 실패하면 과거 캔들로 직접 계산해
    /// `IndicatorSource::Derived`로 표시합니다. 둘 다 실패하면 서버 에러를
    /// 반환합니다.
    #[instrument(skip(self), fields(indicator = %request.spec, window = %request.window))]
    pub async fn get_indicator(
        &self,
        symbol: &str,
        request: &IndicatorRequest,
    ) -> Result<IndicatorSeries> {
        let symbol = checked_symbol(symbol)?;
        let key = indicator_key(&symbol, request);

        if let Some(series) = self.cached::<IndicatorSeries>(
            INDICATOR_NAMESPACE,
            &key,
            self.indicator_freshness().into(),
        ) {
            debug!(key = %key, source = ?series.source, "지표 캐시 적중");
            return Ok(series);
        }

        let server_error = match self.fetcher.fetch_indicator(&symbol, request).await {
            Ok(values) => {
                let series = IndicatorSeries {
                    symbol: symbol.clone(),
                    spec: request.spec,
                    source: IndicatorSource::Server,
                    values,
                };
                self.cache.set(INDICATOR_NAMESPACE, key, series.clone().into_market_data());
                return Ok(series);
            }
            Err(e) => e,
        };

        warn!(
            symbol = %symbol,
            error = %server_error,
            "서버 지표 조회 실패, 로컬 계산으로 대체"
        );

        match self.get_historical(&symbol, &request.window).await {
            Ok(bars) => {
                let series = IndicatorSeries {
                    symbol: symbol.clone(),
                    spec: request.spec,
                    source: IndicatorSource::Derived,
                    values: self.engine.compute(&bars, &request.spec),
                };
                debug!(symbol = %symbol, bars = bars.len(), points = series.values.len(), "지표 로컬 계산 완료");
                self.cache.set(INDICATOR_NAMESPACE, key, series.clone().into_market_data());
                Ok(series)
            }
            Err(history_error) => {
                warn!(
                    symbol = %symbol,
                    error = %history_error,
                    "과거 데이터도 조회 실패, 지표 제공 불가"
                );
                Err(server_error)
            }
        }
    }

    // =========================================================================
    // 배치 조회
    // =========================================================================

    /// 여러 심볼의 실시간 시세 조회.
    ///
    /// 부분 성공은 에러가 아닙니다. 조회에 실패한 심볼은 stale 캐시로 대체하고,
    /// 그것도 없으면 결과에서 빠집니다. 입력이 비어 있지 않은데 어떤 심볼도
    /// 제공하지 못했고 배치 조회 자체가 실패한 경우에만 에러를 반환합니다.
    pub async fn get_batch(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        self.get_batch_within(symbols, self.freshness(DataKind::Realtime))
            .await
    }

    /// `get_batch`와 같지만 `max_age`보다 오래된 캐시는 적중으로 보지 않습니다.
    ///
    /// 실제 신선도는 `max_age`와 TTL 중 짧은 쪽입니다. 폴링 주기가 TTL보다
    /// 짧은 구독이 매 주기마다 새 값을 받도록 오케스트레이터가 사용합니다.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn get_batch_within(
        &self,
        symbols: &[String],
        max_age: Duration,
    ) -> Result<HashMap<String, Quote>> {
        let namespace = DataKind::Realtime.namespace();
        let freshness = max_age.min(self.freshness(DataKind::Realtime));
        let requested = symbol_set(symbols);

        let mut result = HashMap::with_capacity(requested.len());
        let mut misses = Vec::new();

        for symbol in &requested {
            match self.cached::<Quote>(namespace, symbol, freshness.into()) {
                Some(quote) => {
                    result.insert(symbol.clone(), quote);
                }
                None => misses.push(symbol.clone()),
            }
        }

        debug!(hits = result.len(), misses = misses.len(), "배치 캐시 분할");

        if misses.is_empty() {
            return Ok(result);
        }

        let batch_error = match self.fetcher.fetch_batch_realtime(&misses).await {
            Ok(fetched) => {
                for (symbol, quote) in fetched {
                    let symbol = normalize_symbol(&symbol);
                    if requested.contains(&symbol) && !result.contains_key(&symbol) {
                        self.cache.set(namespace, symbol.clone(), quote.clone().into_market_data());
                        result.insert(symbol, quote);
                    }
                }
                None
            }
            Err(e) => {
                warn!(symbols = ?misses, error = %e, "배치 시세 조회 실패");
                Some(e)
            }
        };

        let unresolved: Vec<String> = misses
            .into_iter()
            .filter(|s| !result.contains_key(s))
            .collect();

        for symbol in unresolved {
            match self.stale::<Quote>(namespace, &symbol) {
                Some(quote) => {
                    result.insert(symbol, quote);
                }
                None => debug!(symbol = %symbol, "조회 실패, 결과에서 제외"),
            }
        }

        match batch_error {
            Some(e) if result.is_empty() => Err(e),
            _ => Ok(result),
        }
    }

    /// 여러 심볼의 과거 캔들 조회. 심볼별로 동시에 조회하며 부분 성공 규칙은
    /// `get_batch`와 같습니다.
    #[instrument(skip(self, symbols), fields(count = symbols.len(), window = %window))]
    pub async fn get_historical_batch(
        &self,
        symbols: &[String],
        window: &HistoryWindow,
    ) -> Result<HashMap<String, Vec<Bar>>> {
        self.get_historical_batch_within(symbols, window, self.freshness(DataKind::Historical))
            .await
    }

    /// 신선도 상한을 둔 `get_historical_batch`.
    pub async fn get_historical_batch_within(
        &self,
        symbols: &[String],
        window: &HistoryWindow,
        max_age: Duration,
    ) -> Result<HashMap<String, Vec<Bar>>> {
        let freshness = max_age.min(self.freshness(DataKind::Historical));
        let requested = symbol_set(symbols);
        let results = join_all(
            requested
                .iter()
                .map(|s| self.historical_within(s, window, freshness)),
        )
        .await;
        collect_partial(requested, results)
    }

    /// 여러 심볼의 펀더멘털 조회. 부분 성공 규칙은 `get_batch`와 같습니다.
    #[instrument(skip(self, symbols), fields(count = symbols.len()))]
    pub async fn get_fundamentals_batch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, Fundamentals>> {
        self.get_fundamentals_batch_within(symbols, self.freshness(DataKind::Fundamentals))
            .await
    }

    /// 신선도 상한을 둔 `get_fundamentals_batch`.
    pub async fn get_fundamentals_batch_within(
        &self,
        symbols: &[String],
        max_age: Duration,
    ) -> Result<HashMap<String, Fundamentals>> {
        let freshness = max_age.min(self.freshness(DataKind::Fundamentals));
        let requested = symbol_set(symbols);
        let results =
            join_all(requested.iter().map(|s| self.fundamentals_within(s, freshness))).await;
        collect_partial(requested, results)
    }

    // =========================================================================
    // 무효화
    // =========================================================================

    /// 심볼의 캐시 항목을 모두 삭제하고 삭제 개수를 반환합니다.
    ///
    /// 과거 캔들을 무효화하면 그 캔들로 계산된 지표도 함께 삭제합니다.
    pub fn invalidate(&self, kind: DataKind, symbol: &str) -> usize {
        let symbol = normalize_symbol(symbol);
        if symbol.is_empty() {
            return 0;
        }

        let namespace = kind.namespace();
        let prefix = format!("{}:*", symbol);
        let mut removed = self.cache.clear_pattern(namespace, &symbol);
        removed += self.cache.clear_pattern(namespace, &prefix);

        if kind == DataKind::Historical {
            removed += self.cache.clear_pattern(INDICATOR_NAMESPACE, &prefix);
        }

        debug!(kind = %kind, symbol = %symbol, removed = removed, "캐시 무효화");
        removed
    }

    // =========================================================================
    // 내부 헬퍼
    // =========================================================================

    /// 캐시 조회 → fetch → 저장, 실패 시 stale 대체.
    async fn cache_aside<T, F>(
        &self,
        namespace: &str,
        key: &str,
        freshness: Duration,
        fetch: F,
    ) -> Result<T>
    where
        T: Cached,
        F: Future<Output = Result<T>>,
    {
        if let Some(value) = self.cached::<T>(namespace, key, freshness.into()) {
            debug!(namespace = namespace, key = key, "캐시 적중");
            return Ok(value);
        }

        match fetch.await {
            Ok(value) => {
                self.cache.set(namespace, key, value.clone().into_market_data());
                Ok(value)
            }
            Err(e) => match self.stale::<T>(namespace, key) {
                Some(value) => Ok(value),
                None => Err(e),
            },
        }
    }

    fn cached<T: Cached>(&self, namespace: &str, key: &str, max_age: MaxAge) -> Option<T> {
        self.cache
            .get(namespace, key, max_age)
            .and_then(T::from_market_data)
    }

    fn stale<T: Cached>(&self, namespace: &str, key: &str) -> Option<T> {
        let entry = self.cache.get_entry(namespace, key, MaxAge::Unbounded)?;
        warn!(
            namespace = namespace,
            key = key,
            age_secs = entry.age().as_secs(),
            "조회 실패, stale 캐시 데이터 사용"
        );
        T::from_market_data(entry.value)
    }
}

/// 정규화된 심볼. 빈 심볼은 조회할 수 없습니다.
fn checked_symbol(symbol: &str) -> Result<String> {
    let symbol = normalize_symbol(symbol);
    if symbol.is_empty() {
        return Err(FeedError::NotFound("빈 심볼".to_string()));
    }
    Ok(symbol)
}

fn historical_key(symbol: &str, window: &HistoryWindow) -> String {
    format!("{}:{}", symbol, window.cache_key())
}

fn indicator_key(symbol: &str, request: &IndicatorRequest) -> String {
    format!("{}:{}", symbol, request.cache_key())
}

/// 캔들을 시간 오름차순으로 정렬하고, 중복 타임스탬프는 마지막 것만 남깁니다.
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    // 안정 정렬이므로 같은 타임스탬프 안에서는 원래 순서가 유지됨
    bars.sort_by_key(|bar| bar.timestamp);

    let mut normalized: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match normalized.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => normalized.push(bar),
        }
    }
    normalized
}

/// 심볼별 결과를 부분 성공 맵으로 모읍니다.
fn collect_partial<T>(
    requested: SymbolSet,
    results: Vec<Result<T>>,
) -> Result<HashMap<String, T>> {
    let mut collected = HashMap::with_capacity(requested.len());
    let mut first_error = None;

    for (symbol, result) in requested.into_iter().zip(results) {
        match result {
            Ok(value) => {
                collected.insert(symbol, value);
            }
            Err(e) => {
                debug!(symbol = %symbol, error = %e, "조회 실패, 결과에서 제외");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if collected.is_empty() => Err(e),
        _ => Ok(collected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFetcher;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use feed_core::{IndicatorSpec, IndicatorValues};
    use rust_decimal_macros::dec;

    fn repository(fetcher: Arc<MockFetcher>) -> DataRepository {
        let config = CacheConfig::default();
        DataRepository::new(Arc::new(TtlCache::new(config.clone())), fetcher, config)
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_realtime_cache_aside() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());

        let first = repo.get_realtime(" aapl ").await.unwrap();
        let second = repo.get_realtime("AAPL").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(fetcher.realtime_calls(), 1);

        tokio::time::advance(Duration::from_secs(11)).await;
        repo.get_realtime("AAPL").await.unwrap();
        assert_eq!(fetcher.realtime_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_realtime_stale_fallback() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());

        let fresh = repo.get_realtime("AAPL").await.unwrap();
        tokio::time::advance(Duration::from_secs(60)).await;
        fetcher.fail_symbol("AAPL", FeedError::Transient("timeout".into()));

        let stale = repo.get_realtime("AAPL").await.unwrap();
        assert_eq!(stale, fresh);

        // 캐시에 없으면 에러 전파
        fetcher.fail_symbol("MSFT", FeedError::Server("502".into()));
        assert!(matches!(repo.get_realtime("MSFT").await, Err(FeedError::Server(_))));
    }

    #[tokio::test]
    async fn test_empty_symbol_rejected() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());

        assert!(matches!(repo.get_realtime("  ").await, Err(FeedError::NotFound(_))));
        assert_eq!(fetcher.realtime_calls(), 0);
    }

    #[tokio::test]
    async fn test_get_historical_normalizes_bars() {
        let fetcher = Arc::new(MockFetcher::new());
        let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let bar = |day: i64, close| {
            Bar::new(start + ChronoDuration::days(day), close, close, close, close, dec!(1))
        };
        fetcher.set_bars(
            "AAPL",
            vec![bar(2, dec!(3)), bar(0, dec!(1)), bar(1, dec!(2)), bar(1, dec!(20))],
        );
        let repo = repository(fetcher.clone());

        let bars = repo
            .get_historical("AAPL", &HistoryWindow::daily(30))
            .await
            .unwrap();

        let closes: Vec<_> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![dec!(1), dec!(20), dec!(3)]);
        assert_eq!(repo.cache().stats("historical").size, 1);

        // 다른 범위는 다른 캐시 키
        repo.get_historical("AAPL", &HistoryWindow::daily(90)).await.unwrap();
        assert_eq!(fetcher.historical_calls(), 2);
    }

    #[tokio::test]
    async fn test_get_batch_partial_failure() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail_symbol("BBB", FeedError::NotFound("BBB".into()));
        let repo = repository(fetcher.clone());

        let result = repo
            .get_batch(&["AAA".to_string(), "BBB".to_string()])
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert!(result.contains_key("AAA"));
    }

    #[tokio::test]
    async fn test_get_batch_uses_cache_for_hits() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());

        repo.get_realtime("AAPL").await.unwrap();
        let result = repo
            .get_batch(&["AAPL".to_string(), "msft".to_string()])
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(fetcher.batch_requests(), vec![vec!["MSFT".to_string()]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_batch_total_failure() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());
        fetcher.fail_batch(FeedError::Transient("down".into()));

        let err = repo.get_batch(&["AAPL".to_string()]).await.unwrap_err();
        assert!(err.is_retryable());

        // 빈 입력은 에러가 아님
        assert!(repo.get_batch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_batch_stale_fallback_when_endpoint_down() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());
        repo.get_realtime("AAPL").await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        fetcher.fail_batch(FeedError::Server("503".into()));

        let result = repo
            .get_batch(&["AAPL".to_string(), "MSFT".to_string()])
            .await
            .unwrap();
        assert_eq!(result.keys().collect::<Vec<_>>(), vec!["AAPL"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_batch_mixes_fresh_stale_and_missing() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());
        repo.get_realtime("OLD").await.unwrap();

        tokio::time::advance(Duration::from_secs(60)).await;
        fetcher.fail_symbol("OLD", FeedError::NotFound("OLD".into()));
        fetcher.fail_symbol("GONE", FeedError::NotFound("GONE".into()));

        let result = repo
            .get_batch(&["NEW".to_string(), "OLD".to_string(), "GONE".to_string()])
            .await
            .unwrap();

        let mut keys: Vec<_> = result.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec!["NEW", "OLD"]);
        assert_eq!(
            fetcher.batch_requests(),
            vec![vec!["GONE".to_string(), "NEW".to_string(), "OLD".to_string()]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_batch_within_refetches_younger_than_ttl() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());
        let symbols = vec!["AAPL".to_string()];

        repo.get_batch(&symbols).await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;

        // TTL(10초) 안이므로 기본 조회는 캐시 적중
        repo.get_batch(&symbols).await.unwrap();
        assert_eq!(fetcher.batch_requests().len(), 1);

        // 2초 상한이면 3초 된 항목은 다시 조회
        repo.get_batch_within(&symbols, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(fetcher.batch_requests().len(), 2);

        // 상한이 TTL보다 길어도 TTL이 우선
        tokio::time::advance(Duration::from_secs(11)).await;
        repo.get_batch_within(&symbols, Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(fetcher.batch_requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_helpers_within_bound() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());
        let symbols = vec!["AAPL".to_string()];
        let window = HistoryWindow::daily(10);

        repo.get_historical_batch(&symbols, &window).await.unwrap();
        repo.get_fundamentals_batch(&symbols).await.unwrap();
        tokio::time::advance(Duration::from_secs(5)).await;

        repo.get_historical_batch_within(&symbols, &window, Duration::from_secs(10))
            .await
            .unwrap();
        repo.get_fundamentals_batch_within(&symbols, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(fetcher.historical_calls(), 1);
        assert_eq!(fetcher.fundamentals_calls(), 1);

        repo.get_historical_batch_within(&symbols, &window, Duration::from_secs(4))
            .await
            .unwrap();
        repo.get_fundamentals_batch_within(&symbols, Duration::from_secs(4))
            .await
            .unwrap();
        assert_eq!(fetcher.historical_calls(), 2);
        assert_eq!(fetcher.fundamentals_calls(), 2);
    }

    #[tokio::test]
    async fn test_get_indicator_prefers_server() {
        let fetcher = Arc::new(MockFetcher::new());
        let repo = repository(fetcher.clone());

        let series = repo
            .get_indicator("AAPL", &IndicatorSpec::rsi().into())
            .await
            .unwrap();

        assert_eq!(series.source, IndicatorSource::Server);
        assert_eq!(fetcher.historical_calls(), 0);

        repo.get_indicator("AAPL", &IndicatorSpec::rsi().into())
            .await
            .unwrap();
        assert_eq!(fetcher.indicator_calls(), 1);
    }

    #[tokio::test]
    async fn test_get_indicator_derived_fallback() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail_indicators(FeedError::Server("500".into()));
        let repo = repository(fetcher.clone());

        let request = IndicatorRequest::new(IndicatorSpec::Sma { period: 3 }, HistoryWindow::daily(30));
        let series = repo.get_indicator("AAPL", &request).await.unwrap();

        assert!(series.is_derived());
        let bars = fetcher.bars_for("AAPL");
        match series.values {
            IndicatorValues::Single(points) => assert_eq!(points.len(), bars.len() - 2),
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_indicator_returns_server_error_when_both_fail() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail_indicators(FeedError::Server("500".into()));
        fetcher.fail_symbol("AAPL", FeedError::NotFound("AAPL".into()));
        let repo = repository(fetcher.clone());

        let err = repo
            .get_indicator("AAPL", &IndicatorSpec::macd().into())
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Server(_)));
    }

    #[tokio::test]
    async fn test_invalidate() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail_indicators(FeedError::Server("500".into()));
        let repo = repository(fetcher.clone());

        repo.get_historical("AAPL", &HistoryWindow::daily(30)).await.unwrap();
        repo.get_historical("AAPLX", &HistoryWindow::daily(30)).await.unwrap();
        repo.get_indicator("AAPL", &IndicatorRequest::new(IndicatorSpec::Vwap, HistoryWindow::daily(30)))
            .await
            .unwrap();

        assert_eq!(repo.invalidate(DataKind::Historical, "aapl"), 2);
        assert_eq!(repo.cache().stats("historical").size, 1);
        assert_eq!(repo.cache().stats(INDICATOR_NAMESPACE).size, 0);
    }

    #[tokio::test]
    async fn test_batch_helpers_partial_success() {
        let fetcher = Arc::new(MockFetcher::new());
        fetcher.fail_symbol("BAD", FeedError::NotFound("BAD".into()));
        let repo = repository(fetcher.clone());
        let symbols = vec!["GOOD".to_string(), "BAD".to_string()];

        let bars = repo
            .get_historical_batch(&symbols, &HistoryWindow::daily(10))
            .await
            .unwrap();
        let fundamentals = repo.get_fundamentals_batch(&symbols).await.unwrap();

        assert_eq!(bars.len(), 1);
        assert_eq!(fundamentals.len(), 1);
        assert!(matches!(
            repo.get_fundamentals_batch(&["BAD".to_string()]).await,
            Err(FeedError::NotFound(_))
        ));
    }

    #[test]
    fn test_normalize_bars_empty() {
        assert!(normalize_bars(Vec::new()).is_empty());
    }
}
