//! 추세 지표 (Trend Indicators).
//!
//! 이동평균 기반의 추세 지표들을 제공합니다.
//! - SMA (Simple Moving Average)
//! - EMA (Exponential Moving Average)
//! - MACD (Moving Average Convergence Divergence)

use feed_core::{Bar, IndicatorPoint, MacdPoint};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::align_by_timestamp;

/// 스트리밍 EMA 상태.
///
/// 전체 시리즈를 다시 계산하지 않고 캔들 하나씩 갱신합니다.
/// 첫 값이 시드가 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmaState {
    /// 마지막 EMA 값 (아직 값을 받지 않았으면 None)
    pub last_ema: Option<Decimal>,
    /// 평활 계수 k = 2 / (period + 1)
    pub multiplier: Decimal,
}

impl EmaState {
    /// 기간으로 상태를 생성합니다. 기간 0은 1로 취급합니다.
    pub fn new(period: usize) -> Self {
        Self {
            last_ema: None,
            multiplier: dec!(2) / Decimal::from(period.max(1) + 1),
        }
    }

    /// 새 값을 반영하고 갱신된 EMA를 반환합니다.
    ///
    /// ema[t] = (value - ema[t-1]) × k + ema[t-1]
    pub fn update(&mut self, value: Decimal) -> Decimal {
        let ema = match self.last_ema {
            None => value,
            Some(prev) => (value - prev) * self.multiplier + prev,
        };
        self.last_ema = Some(ema);
        ema
    }

    /// 현재 EMA 값.
    pub fn value(&self) -> Option<Decimal> {
        self.last_ema
    }
}

/// SMA 이터레이터. `trend.sma()`로 생성합니다.
#[derive(Debug)]
pub struct Sma<'a> {
    windows: Option<std::slice::Windows<'a, Bar>>,
    divisor: Decimal,
}

impl Iterator for Sma<'_> {
    type Item = IndicatorPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.windows.as_mut()?.next()?;
        let sum: Decimal = window.iter().map(|b| b.close).sum();
        let last = window.last()?;
        Some(IndicatorPoint::new(last.timestamp, sum / self.divisor))
    }
}

/// EMA 이터레이터. `trend.ema()`로 생성합니다.
#[derive(Debug)]
pub struct Ema<'a> {
    bars: Option<std::slice::Iter<'a, Bar>>,
    state: EmaState,
}

impl Iterator for Ema<'_> {
    type Item = IndicatorPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let bar = self.bars.as_mut()?.next()?;
        let value = self.state.update(bar.close);
        Some(IndicatorPoint::new(bar.timestamp, value))
    }
}

/// 추세 지표 계산기.
#[derive(Debug, Default)]
pub struct TrendIndicators;

impl TrendIndicators {
    /// 새로운 추세 지표 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// 단순 이동평균 (SMA) 계산.
    ///
    /// SMA = (P1 + P2 + ... + Pn) / n
    ///
    /// 결과 길이는 `len - period + 1`이며, 처음 `period - 1`개 지점은 생략됩니다.
    pub fn sma<'a>(&self, bars: &'a [Bar], period: usize) -> Sma<'a> {
        let windows = if period == 0 || bars.len() < period {
            None
        } else {
            Some(bars.windows(period))
        };

        Sma {
            windows,
            divisor: Decimal::from(period.max(1)),
        }
    }

    /// 지수 이동평균 (EMA) 계산.
    ///
    /// 첫 종가로 시드하고, 이후 ema[t] = (종가 - ema[t-1]) × k + ema[t-1],
    /// k = 2 / (period + 1). 캔들마다 한 포인트를 냅니다.
    pub fn ema<'a>(&self, bars: &'a [Bar], period: usize) -> Ema<'a> {
        let iter = if period == 0 || bars.len() < period {
            None
        } else {
            Some(bars.iter())
        };

        Ema {
            bars: iter,
            state: EmaState::new(period),
        }
    }

    /// MACD 계산.
    ///
    /// MACD 라인 = 단기 EMA - 장기 EMA (두 EMA가 모두 정의된 구간)
    /// 시그널 라인 = MACD 라인의 EMA
    /// 히스토그램 = MACD 라인 - 시그널 라인 (두 라인이 모두 정의된 구간)
    pub fn macd(&self, bars: &[Bar], fast: usize, slow: usize, signal: usize) -> Vec<MacdPoint> {
        if fast == 0 || slow == 0 || signal == 0 {
            return Vec::new();
        }

        let fast_ema: Vec<IndicatorPoint> = self.ema(bars, fast).collect();
        let slow_ema: Vec<IndicatorPoint> = self.ema(bars, slow).collect();

        let macd_line: Vec<IndicatorPoint> = align_by_timestamp(&fast_ema, &slow_ema)
            .into_iter()
            .map(|(ts, f, s)| IndicatorPoint::new(ts, f - s))
            .collect();

        let signal_line = ema_of_points(&macd_line, signal);

        align_by_timestamp(&macd_line, &signal_line)
            .into_iter()
            .map(|(timestamp, macd, signal)| MacdPoint {
                timestamp,
                macd,
                signal,
                histogram: macd - signal,
            })
            .collect()
    }
}

/// 지표 포인트 시리즈 위의 EMA (MACD 시그널 라인용).
fn ema_of_points(points: &[IndicatorPoint], period: usize) -> Vec<IndicatorPoint> {
    if period == 0 || points.len() < period {
        return Vec::new();
    }

    let mut state = EmaState::new(period);
    points
        .iter()
        .map(|p| IndicatorPoint::new(p.timestamp, state.update(p.value)))
        .collect()
}
