//! 지표 타입.
//!
//! 서버가 계산한 지표와 클라이언트에서 대체 계산한 지표가 같은 형태를 갖도록
//! 포인트 타입과 지표 명세를 공유합니다.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 단일 값 지표 포인트.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

impl IndicatorPoint {
    pub fn new(timestamp: DateTime<Utc>, value: Decimal) -> Self {
        Self { timestamp, value }
    }
}

/// 볼린저 밴드 포인트.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerPoint {
    pub timestamp: DateTime<Utc>,
    /// 상단 밴드 (MA + k × σ)
    pub upper: Decimal,
    /// 중간 밴드 (이동평균)
    pub middle: Decimal,
    /// 하단 밴드 (MA - k × σ)
    pub lower: Decimal,
}

/// MACD 포인트.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub timestamp: DateTime<Utc>,
    /// MACD 라인 (단기 EMA - 장기 EMA)
    pub macd: Decimal,
    /// 시그널 라인 (MACD의 EMA)
    pub signal: Decimal,
    /// 히스토그램 (MACD - 시그널)
    pub histogram: Decimal,
}

/// 지표 계산 결과 값들.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", content = "points", rename_all = "snake_case")]
pub enum IndicatorValues {
    /// SMA, EMA, RSI, VWAP
    Single(Vec<IndicatorPoint>),
    /// 볼린저 밴드
    Bollinger(Vec<BollingerPoint>),
    /// MACD
    Macd(Vec<MacdPoint>),
}

impl IndicatorValues {
    /// 포인트 개수.
    pub fn len(&self) -> usize {
        match self {
            IndicatorValues::Single(points) => points.len(),
            IndicatorValues::Bollinger(points) => points.len(),
            IndicatorValues::Macd(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 마지막 포인트의 타임스탬프.
    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            IndicatorValues::Single(points) => points.last().map(|p| p.timestamp),
            IndicatorValues::Bollinger(points) => points.last().map(|p| p.timestamp),
            IndicatorValues::Macd(points) => points.last().map(|p| p.timestamp),
        }
    }
}

/// 지표 명세 (종류 + 파라미터).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum IndicatorSpec {
    /// 단순 이동평균
    Sma { period: usize },
    /// 지수 이동평균
    Ema { period: usize },
    /// 상대강도지수 (Wilder)
    Rsi { period: usize },
    /// 이동평균 수렴/확산
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    /// 볼린저 밴드
    Bollinger { period: usize, k: Decimal },
    /// 거래량 가중 평균가 (구간 누적)
    Vwap,
}

impl IndicatorSpec {
    /// 기본 SMA (20).
    pub fn sma() -> Self {
        IndicatorSpec::Sma { period: 20 }
    }

    /// 기본 EMA (12).
    pub fn ema() -> Self {
        IndicatorSpec::Ema { period: 12 }
    }

    /// 기본 RSI (14).
    pub fn rsi() -> Self {
        IndicatorSpec::Rsi { period: 14 }
    }

    /// 기본 MACD (12, 26, 9).
    pub fn macd() -> Self {
        IndicatorSpec::Macd {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }

    /// 기본 볼린저 밴드 (20, 2).
    pub fn bollinger() -> Self {
        IndicatorSpec::Bollinger {
            period: 20,
            k: dec!(2),
        }
    }

    /// 지표 이름.
    pub fn name(&self) -> &'static str {
        match self {
            IndicatorSpec::Sma { .. } => "sma",
            IndicatorSpec::Ema { .. } => "ema",
            IndicatorSpec::Rsi { .. } => "rsi",
            IndicatorSpec::Macd { .. } => "macd",
            IndicatorSpec::Bollinger { .. } => "bollinger",
            IndicatorSpec::Vwap => "vwap",
        }
    }

    /// 캐시 키에 쓰이는 파라미터 포함 표현 (예: "rsi(14)").
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IndicatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorSpec::Sma { period }
            | IndicatorSpec::Ema { period }
            | IndicatorSpec::Rsi { period } => write!(f, "{}({})", self.name(), period),
            IndicatorSpec::Macd { fast, slow, signal } => {
                write!(f, "macd({},{},{})", fast, slow, signal)
            }
            IndicatorSpec::Bollinger { period, k } => {
                write!(f, "bollinger({},{})", period, k.normalize())
            }
            IndicatorSpec::Vwap => write!(f, "vwap"),
        }
    }
}

/// 지표 계산 출처.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorSource {
    /// 서버 지표 엔드포인트
    Server,
    /// 서버 실패 시 로컬 캔들로 대체 계산
    Derived,
}

/// 심볼 하나에 대한 지표 시리즈.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub symbol: String,
    pub spec: IndicatorSpec,
    pub source: IndicatorSource,
    pub values: IndicatorValues,
}

impl IndicatorSeries {
    /// 클라이언트 대체 계산 결과인지 확인합니다.
    pub fn is_derived(&self) -> bool {
        self.source == IndicatorSource::Derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_cache_key() {
        assert_eq!(IndicatorSpec::rsi().cache_key(), "rsi(14)");
        assert_eq!(IndicatorSpec::macd().cache_key(), "macd(12,26,9)");
        assert_eq!(IndicatorSpec::bollinger().cache_key(), "bollinger(20,2)");
        assert_eq!(IndicatorSpec::Vwap.cache_key(), "vwap");
    }

    #[test]
    fn test_spec_serde_tag() {
        let spec: IndicatorSpec = serde_json::from_str(r#"{"name":"ema","period":9}"#).unwrap();
        assert_eq!(spec, IndicatorSpec::Ema { period: 9 });
    }

    #[test]
    fn test_values_len() {
        let values = IndicatorValues::Single(vec![IndicatorPoint::new(Utc::now(), dec!(1))]);
        assert_eq!(values.len(), 1);
        assert!(!values.is_empty());
        assert!(IndicatorValues::Macd(Vec::new()).is_empty());
    }
}
