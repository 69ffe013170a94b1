//! 기술적 지표 모듈.
//!
//! 모든 지표는 순수 함수입니다. 같은 캔들 시퀀스와 파라미터에 대해 항상 같은
//! 결과를 내며, I/O나 공유 가변 상태가 없습니다.
//!
//! # 지원 지표
//!
//! ## 추세 지표 (Trend Indicators)
//! - **SMA**: 단순 이동평균
//! - **EMA**: 지수 이동평균 (첫 종가로 시드)
//! - **MACD**: 이동평균 수렴/확산
//!
//! ## 모멘텀 지표 (Momentum Indicators)
//! - **RSI**: 상대강도지수 (Wilder 평활)
//!
//! ## 변동성 지표 (Volatility Indicators)
//! - **Bollinger Bands**: 볼린저 밴드 (모표준편차)
//!
//! ## 거래량 지표 (Volume Indicators)
//! - **VWAP**: 구간 시작부터 누적한 거래량 가중 평균가
//!
//! # 잘못된 입력
//!
//! 기간이 0이거나 캔들이 기간보다 적으면 에러 대신 빈 시퀀스를 반환합니다.
//! 각 계산기는 지연 평가 이터레이터를 반환하며, 한 번 소비하면 다시 시작할 수 없습니다.
//!
//! # 사용 예시
//!
//! ```ignore
//! use feed_analytics::IndicatorEngine;
//! use feed_core::IndicatorSpec;
//!
//! let engine = IndicatorEngine::new();
//! let rsi = engine.compute(&bars, &IndicatorSpec::rsi());
//! ```

pub mod momentum;
pub mod trend;
pub mod volatility;
pub mod volume;

use chrono::{DateTime, Utc};
use feed_core::{Bar, IndicatorPoint, IndicatorSpec, IndicatorValues};
use rust_decimal::Decimal;

pub use momentum::{MomentumCalculator, Rsi};
pub use trend::{Ema, EmaState, Sma, TrendIndicators};
pub use volatility::{Bollinger, VolatilityIndicators};
pub use volume::{VolumeIndicators, Vwap};

/// 통합 지표 엔진.
///
/// 지표 명세(`IndicatorSpec`)를 받아 해당 계산기로 위임하고,
/// 결과를 서버 응답과 같은 `IndicatorValues` 형태로 모읍니다.
#[derive(Debug, Default)]
pub struct IndicatorEngine {
    trend: TrendIndicators,
    momentum: MomentumCalculator,
    volatility: VolatilityIndicators,
    volume: VolumeIndicators,
}

impl IndicatorEngine {
    /// 새로운 지표 엔진 생성.
    pub fn new() -> Self {
        Self::default()
    }

    /// 지표 명세에 따라 계산합니다.
    pub fn compute(&self, bars: &[Bar], spec: &IndicatorSpec) -> IndicatorValues {
        match *spec {
            IndicatorSpec::Sma { period } => {
                IndicatorValues::Single(self.trend.sma(bars, period).collect())
            }
            IndicatorSpec::Ema { period } => {
                IndicatorValues::Single(self.trend.ema(bars, period).collect())
            }
            IndicatorSpec::Rsi { period } => {
                IndicatorValues::Single(self.momentum.rsi(bars, period).collect())
            }
            IndicatorSpec::Macd { fast, slow, signal } => {
                IndicatorValues::Macd(self.trend.macd(bars, fast, slow, signal))
            }
            IndicatorSpec::Bollinger { period, k } => {
                IndicatorValues::Bollinger(self.volatility.bollinger_bands(bars, period, k).collect())
            }
            IndicatorSpec::Vwap => IndicatorValues::Single(self.volume.vwap(bars).collect()),
        }
    }

    /// 단순 이동평균 (SMA).
    pub fn sma<'a>(&self, bars: &'a [Bar], period: usize) -> Sma<'a> {
        self.trend.sma(bars, period)
    }

    /// 지수 이동평균 (EMA).
    pub fn ema<'a>(&self, bars: &'a [Bar], period: usize) -> Ema<'a> {
        self.trend.ema(bars, period)
    }

    /// RSI (Wilder).
    pub fn rsi<'a>(&self, bars: &'a [Bar], period: usize) -> Rsi<'a> {
        self.momentum.rsi(bars, period)
    }
}

/// 시간 오름차순인 두 시리즈를 타임스탬프 기준으로 맞춰 양쪽 모두
/// 정의된 구간만 돌려줍니다.
pub(crate) fn align_by_timestamp(
    left: &[IndicatorPoint],
    right: &[IndicatorPoint],
) -> Vec<(DateTime<Utc>, Decimal, Decimal)> {
    let mut result = Vec::with_capacity(left.len().min(right.len()));
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        let (l, r) = (&left[i], &right[j]);
        match l.timestamp.cmp(&r.timestamp) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                result.push((l.timestamp, l.value, r.value));
                i += 1;
                j += 1;
            }
        }
    }

    result
}
