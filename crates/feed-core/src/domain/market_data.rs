//! 시장 데이터 타입 및 구조체.
//!
//! 이 모듈은 시장 데이터 관련 타입을 정의합니다:
//! - `Bar` - OHLCV 캔들 데이터
//! - `Quote` - 실시간 시세 스냅샷
//! - `Fundamentals` - 펀더멘털 지표
//! - `MarketData` - 캐시와 구독 콜백이 공유하는 통합 페이로드

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::indicator::IndicatorSeries;

/// OHLCV 캔들 데이터.
///
/// 한 번 생성되면 변경되지 않으며, 시리즈 안에서는 시간 오름차순이고
/// 같은 타임스탬프가 중복되지 않습니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 캔들 시작 시간
    pub timestamp: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Bar {
    /// 새 캔들을 생성합니다.
    pub fn new(
        timestamp: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 대표가(고가+저가+종가 평균)를 반환합니다.
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }

    /// 캔들 범위(고가 - 저가)를 반환합니다.
    pub fn range(&self) -> Decimal {
        self.high - self.low
    }
}

/// 실시간 시세 스냅샷.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// 심볼
    pub symbol: String,
    /// 시세 시각
    pub timestamp: DateTime<Utc>,
    /// 당일 시가
    pub open: Decimal,
    /// 당일 고가
    pub high: Decimal,
    /// 당일 저가
    pub low: Decimal,
    /// 최근 체결가
    pub price: Decimal,
    /// 당일 거래량
    pub volume: Decimal,
    /// 전일 종가
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<Decimal>,
}

impl Quote {
    /// 전일 대비 변동폭.
    pub fn change(&self) -> Option<Decimal> {
        self.previous_close.map(|prev| self.price - prev)
    }

    /// 전일 대비 변동률 (%).
    pub fn change_percent(&self) -> Option<Decimal> {
        match self.previous_close {
            Some(prev) if !prev.is_zero() => {
                Some((self.price - prev) / prev * Decimal::ONE_HUNDRED)
            }
            _ => None,
        }
    }
}

/// 펀더멘털 지표.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fundamentals {
    /// 심볼
    pub symbol: String,
    /// 시가총액
    #[serde(default)]
    pub market_cap: Option<Decimal>,
    /// PER
    #[serde(default)]
    pub pe_ratio: Option<Decimal>,
    /// EPS
    #[serde(default)]
    pub eps: Option<Decimal>,
    /// 배당수익률 (%)
    #[serde(default)]
    pub dividend_yield: Option<Decimal>,
    /// 52주 최고가
    #[serde(default)]
    pub week52_high: Option<Decimal>,
    /// 52주 최저가
    #[serde(default)]
    pub week52_low: Option<Decimal>,
    /// 데이터 기준 시각
    pub updated_at: DateTime<Utc>,
}

/// 캐시, 저장소, 구독 콜백이 주고받는 통합 시장 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum MarketData {
    /// 실시간 시세
    Quote(Quote),
    /// 과거 캔들 (시간 오름차순)
    Bars(Vec<Bar>),
    /// 펀더멘털
    Fundamentals(Fundamentals),
    /// 지표 시리즈
    Indicator(IndicatorSeries),
}

impl MarketData {
    /// 시세 데이터이면 참조를 반환합니다.
    pub fn as_quote(&self) -> Option<&Quote> {
        match self {
            MarketData::Quote(q) => Some(q),
            _ => None,
        }
    }

    /// 캔들 데이터이면 참조를 반환합니다.
    pub fn as_bars(&self) -> Option<&[Bar]> {
        match self {
            MarketData::Bars(bars) => Some(bars),
            _ => None,
        }
    }

    /// 펀더멘털 데이터이면 참조를 반환합니다.
    pub fn as_fundamentals(&self) -> Option<&Fundamentals> {
        match self {
            MarketData::Fundamentals(f) => Some(f),
            _ => None,
        }
    }

    /// 지표 시리즈이면 참조를 반환합니다.
    pub fn as_indicator(&self) -> Option<&IndicatorSeries> {
        match self {
            MarketData::Indicator(series) => Some(series),
            _ => None,
        }
    }
}
