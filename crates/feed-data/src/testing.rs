//! 단위 테스트용 fetch 협력자.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use feed_core::{
    Bar, FeedError, Fundamentals, HistoryWindow, IndicatorPoint, IndicatorRequest,
    IndicatorValues, Quote, Result,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::provider::MarketDataFetcher;

#[derive(Default)]
struct MockState {
    symbol_failures: HashMap<String, FeedError>,
    /// (에러, 남은 횟수). 횟수가 None이면 계속 실패
    batch_failure: Option<(FeedError, Option<usize>)>,
    indicator_failure: Option<FeedError>,
    bars: HashMap<String, Vec<Bar>>,
    delay: Option<Duration>,
}

/// 호출 횟수를 세고 실패를 주입할 수 있는 fetch 협력자.
#[derive(Default)]
pub(crate) struct MockFetcher {
    state: Mutex<MockState>,
    realtime_calls: AtomicUsize,
    historical_calls: AtomicUsize,
    indicator_calls: AtomicUsize,
    fundamentals_calls: AtomicUsize,
    batch_requests: Mutex<Vec<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_symbol(&self, symbol: &str, error: FeedError) {
        self.state.lock().unwrap().symbol_failures.insert(symbol.to_string(), error);
    }

    pub fn fail_batch(&self, error: FeedError) {
        self.state.lock().unwrap().batch_failure = Some((error, None));
    }

    pub fn fail_batch_times(&self, error: FeedError, times: usize) {
        self.state.lock().unwrap().batch_failure = Some((error, Some(times)));
    }

    pub fn fail_indicators(&self, error: FeedError) {
        self.state.lock().unwrap().indicator_failure = Some(error);
    }

    pub fn set_bars(&self, symbol: &str, bars: Vec<Bar>) {
        self.state.lock().unwrap().bars.insert(symbol.to_string(), bars);
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn bars_for(&self, symbol: &str) -> Vec<Bar> {
        self.state
            .lock()
            .unwrap()
            .bars
            .get(symbol)
            .cloned()
            .unwrap_or_else(default_bars)
    }

    pub fn realtime_calls(&self) -> usize {
        self.realtime_calls.load(Ordering::SeqCst)
    }

    pub fn historical_calls(&self) -> usize {
        self.historical_calls.load(Ordering::SeqCst)
    }

    pub fn indicator_calls(&self) -> usize {
        self.indicator_calls.load(Ordering::SeqCst)
    }

    pub fn fundamentals_calls(&self) -> usize {
        self.fundamentals_calls.load(Ordering::SeqCst)
    }

    pub fn batch_requests(&self) -> Vec<Vec<String>> {
        self.batch_requests.lock().unwrap().clone()
    }

    fn symbol_failure(&self, symbol: &str) -> Option<FeedError> {
        self.state.lock().unwrap().symbol_failures.get(symbol).cloned()
    }

    fn take_batch_failure(&self) -> Option<FeedError> {
        let mut state = self.state.lock().unwrap();
        match state.batch_failure.take() {
            Some((error, None)) => {
                state.batch_failure = Some((error.clone(), None));
                Some(error)
            }
            Some((error, Some(remaining))) if remaining > 0 => {
                state.batch_failure = Some((error.clone(), Some(remaining - 1)));
                Some(error)
            }
            _ => None,
        }
    }

    async fn maybe_delay(&self) {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub(crate) fn quote_for(symbol: &str) -> Quote {
    Quote {
        symbol: symbol.to_string(),
        timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 15, 30, 0).unwrap(),
        open: dec!(100),
        high: dec!(102),
        low: dec!(99),
        price: dec!(101),
        volume: dec!(5000),
        previous_close: Some(dec!(100)),
    }
}

fn default_bars() -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    (0..60)
        .map(|i| {
            let close = dec!(100) + Decimal::from(i % 5);
            Bar::new(
                start + ChronoDuration::days(i),
                close,
                close + dec!(1),
                close - dec!(1),
                close,
                dec!(1000),
            )
        })
        .collect()
}

#[async_trait]
impl MarketDataFetcher for MockFetcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_realtime(&self, symbol: &str) -> Result<Quote> {
        self.realtime_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        match self.symbol_failure(symbol) {
            Some(error) => Err(error),
            None => Ok(quote_for(symbol)),
        }
    }

    async fn fetch_historical(&self, symbol: &str, _window: &HistoryWindow) -> Result<Vec<Bar>> {
        self.historical_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        match self.symbol_failure(symbol) {
            Some(error) => Err(error),
            None => Ok(self.bars_for(symbol)),
        }
    }

    async fn fetch_indicator(
        &self,
        symbol: &str,
        _request: &IndicatorRequest,
    ) -> Result<IndicatorValues> {
        self.indicator_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.state.lock().unwrap().indicator_failure.clone();
        if let Some(error) = failure {
            return Err(error);
        }
        if let Some(error) = self.symbol_failure(symbol) {
            return Err(error);
        }
        let timestamp = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        Ok(IndicatorValues::Single(vec![IndicatorPoint::new(timestamp, dec!(55))]))
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_delay().await;
        match self.symbol_failure(symbol) {
            Some(error) => Err(error),
            None => Ok(Fundamentals {
                symbol: symbol.to_string(),
                market_cap: Some(dec!(1000000)),
                pe_ratio: Some(dec!(20)),
                eps: None,
                dividend_yield: None,
                week52_high: None,
                week52_low: None,
                updated_at: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            }),
        }
    }

    async fn fetch_batch_realtime(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        self.batch_requests.lock().unwrap().push(symbols.to_vec());
        self.maybe_delay().await;

        if let Some(error) = self.take_batch_failure() {
            return Err(error);
        }

        Ok(symbols
            .iter()
            .filter(|s| self.symbol_failure(s).is_none())
            .map(|s| (s.clone(), quote_for(s)))
            .collect())
    }
}
