//! 통합 테스트용 공용 도우미.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use feed_core::{
    Bar, FeedError, Fundamentals, HistoryWindow, IndicatorRequest, IndicatorValues, Quote, Result,
};
use feed_data::{FeedUpdate, MarketDataFetcher};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// 심볼마다 고정 가격을 돌려주는 fetch 협력자.
#[derive(Default)]
pub struct ScriptedFetcher {
    prices: Mutex<HashMap<String, Decimal>>,
    unknown: Mutex<HashSet<String>>,
    transient_batches: AtomicUsize,
    indicators_down: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
    batch_calls: Mutex<Vec<Vec<String>>>,
    indicator_calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.lock().unwrap().insert(symbol.to_string(), price);
    }

    /// 존재하지 않는 심볼로 취급합니다.
    pub fn mark_unknown(&self, symbol: &str) {
        self.unknown.lock().unwrap().insert(symbol.to_string());
    }

    /// 다음 `n`번의 배치 조회를 일시적 에러로 실패시킵니다.
    pub fn fail_next_batches(&self, n: usize) {
        self.transient_batches.store(n, Ordering::SeqCst);
    }

    pub fn indicators_down(&self) {
        *self.indicators_down.lock().unwrap() = true;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn batch_calls(&self) -> Vec<Vec<String>> {
        self.batch_calls.lock().unwrap().clone()
    }

    pub fn indicator_calls(&self) -> usize {
        self.indicator_calls.load(Ordering::SeqCst)
    }

    fn price(&self, symbol: &str) -> Decimal {
        self.prices
            .lock()
            .unwrap()
            .get(symbol)
            .copied()
            .unwrap_or(dec!(100))
    }

    fn is_unknown(&self, symbol: &str) -> bool {
        self.unknown.lock().unwrap().contains(symbol)
    }

    async fn wait(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn quote(&self, symbol: &str) -> Quote {
        let price = self.price(symbol);
        Quote {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap(),
            open: price,
            high: price,
            low: price,
            price,
            volume: dec!(1000),
            previous_close: None,
        }
    }
}

#[async_trait]
impl MarketDataFetcher for ScriptedFetcher {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_realtime(&self, symbol: &str) -> Result<Quote> {
        self.wait().await;
        if self.is_unknown(symbol) {
            return Err(FeedError::NotFound(symbol.to_string()));
        }
        Ok(self.quote(symbol))
    }

    async fn fetch_historical(&self, symbol: &str, window: &HistoryWindow) -> Result<Vec<Bar>> {
        if self.is_unknown(symbol) {
            return Err(FeedError::NotFound(symbol.to_string()));
        }
        // 1부터 증가하는 종가
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Ok((0..window.days as i64)
            .map(|i| {
                let close = Decimal::from(i + 1);
                Bar::new(start + ChronoDuration::days(i), close, close, close, close, dec!(10))
            })
            .collect())
    }

    async fn fetch_indicator(
        &self,
        symbol: &str,
        _request: &IndicatorRequest,
    ) -> Result<IndicatorValues> {
        self.indicator_calls.fetch_add(1, Ordering::SeqCst);
        if *self.indicators_down.lock().unwrap() {
            return Err(FeedError::Server("indicator endpoint down".to_string()));
        }
        Err(FeedError::NotFound(symbol.to_string()))
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        if self.is_unknown(symbol) {
            return Err(FeedError::NotFound(symbol.to_string()));
        }
        Ok(Fundamentals {
            symbol: symbol.to_string(),
            market_cap: None,
            pe_ratio: None,
            eps: None,
            dividend_yield: None,
            week52_high: None,
            week52_low: None,
            updated_at: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
        })
    }

    async fn fetch_batch_realtime(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        self.batch_calls.lock().unwrap().push(symbols.to_vec());
        self.wait().await;

        let remaining = self.transient_batches.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_batches.store(remaining - 1, Ordering::SeqCst);
            return Err(FeedError::Transient("connection reset".to_string()));
        }

        Ok(symbols
            .iter()
            .filter(|s| !self.is_unknown(s))
            .map(|s| (s.clone(), self.quote(s)))
            .collect())
    }
}

/// 콜백이 받은 갱신을 모아 둡니다.
#[derive(Clone, Default)]
pub struct Inbox {
    updates: Arc<Mutex<Vec<FeedUpdate>>>,
}

impl Inbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(FeedUpdate) + Send + Sync + 'static {
        let updates = self.updates.clone();
        move |update| updates.lock().unwrap().push(update)
    }

    pub fn updates(&self) -> Vec<FeedUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    /// 데이터 갱신에 담긴 심볼 (정렬됨).
    pub fn data_symbols(&self, index: usize) -> Vec<String> {
        match self.updates().get(index) {
            Some(FeedUpdate::Data(data)) => {
                let mut symbols: Vec<String> = data.keys().cloned().collect();
                symbols.sort();
                symbols
            }
            _ => Vec::new(),
        }
    }
}

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// 스케줄링 루프가 한 패스를 진행하도록 양보합니다.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
