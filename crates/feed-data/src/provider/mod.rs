//! 시장 데이터 fetch 협력자.
//!
//! 파이프라인은 원격 시장 API를 이 trait으로만 접근합니다. 전송 계층의 세부
//! 사항(HTTP, 타임아웃, 인증)은 구현체의 몫이며, 실패는 `FeedError`의
//! 재시도 가능 여부 분류로 올라옵니다.
//!
//! ## 구현체
//! - `HttpMarketFetcher`: JSON REST API 클라이언트 (reqwest)

pub mod http;

pub use http::HttpMarketFetcher;

use std::collections::HashMap;

use async_trait::async_trait;
use feed_core::{Bar, Fundamentals, HistoryWindow, IndicatorRequest, IndicatorValues, Quote, Result};
use futures::future::join_all;
use tracing::debug;

// =============================================================================
// MarketDataFetcher Trait
// =============================================================================

/// 원격 시장 데이터 fetch 협력자.
///
/// # Errors
///
/// - `FeedError::Transient`: 네트워크 실패, 타임아웃, 요청 한도 초과
/// - `FeedError::Server`: 업스트림 5xx
/// - `FeedError::NotFound`: 존재하지 않는 심볼
/// - `FeedError::InvalidData`: 응답 디코딩 실패
#[async_trait]
pub trait MarketDataFetcher: Send + Sync {
    /// 로깅용 이름.
    fn name(&self) -> &str;

    /// 실시간 시세 조회.
    async fn fetch_realtime(&self, symbol: &str) -> Result<Quote>;

    /// 과거 캔들 조회.
    async fn fetch_historical(&self, symbol: &str, window: &HistoryWindow) -> Result<Vec<Bar>>;

    /// 서버 계산 지표 조회.
    async fn fetch_indicator(
        &self,
        symbol: &str,
        request: &IndicatorRequest,
    ) -> Result<IndicatorValues>;

    /// 펀더멘털 조회.
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Fundamentals>;

    /// 여러 심볼의 실시간 시세를 한 번에 조회합니다.
    ///
    /// 실패한 심볼은 결과에서 빠질 수 있습니다. 기본 구현은 `fetch_realtime`을
    /// 동시에 호출하고, 모든 심볼이 실패하면 첫 에러를 반환합니다.
    async fn fetch_batch_realtime(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        let results = join_all(symbols.iter().map(|s| self.fetch_realtime(s))).await;

        let mut quotes = HashMap::with_capacity(symbols.len());
        let mut first_error = None;

        for (symbol, result) in symbols.iter().zip(results) {
            match result {
                Ok(quote) => {
                    quotes.insert(symbol.clone(), quote);
                }
                Err(e) => {
                    debug!(fetcher = self.name(), symbol = %symbol, error = %e, "배치 개별 조회 실패");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if quotes.is_empty() => Err(e),
            _ => Ok(quotes),
        }
    }
}
