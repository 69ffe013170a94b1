//! 변동성 지표 (Volatility Indicators).
//!
//! - Bollinger Bands (볼린저 밴드)

use feed_core::{Bar, BollingerPoint};
use rust_decimal::{Decimal, MathematicalOps};

/// 볼린저 밴드 이터레이터. `volatility.bollinger_bands()`로 생성합니다.
#[derive(Debug)]
pub struct Bollinger<'a> {
    windows: Option<std::slice::Windows<'a, Bar>>,
    period: Decimal,
    multiplier: Decimal,
}

impl Iterator for Bollinger<'_> {
    type Item = BollingerPoint;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.windows.as_mut()?.next()?;
        let last = window.last()?;

        // 이동평균 (중간 밴드)
        let sum: Decimal = window.iter().map(|b| b.close).sum();
        let middle = sum / self.period;

        // 모분산 (n으로 나눔)
        let variance: Decimal = window
            .iter()
            .map(|b| {
                let diff = b.close - middle;
                diff * diff
            })
            .sum::<Decimal>()
            / self.period;

        let std_dev = variance.sqrt().unwrap_or(Decimal::ZERO);
        let deviation = self.multiplier * std_dev;

        Some(BollingerPoint {
            timestamp: last.timestamp,
            upper: middle + deviation,
            middle,
            lower: middle - deviation,
        })
    }
}

/// 변동성 지표 계산기.
#[derive(Debug, Default)]
pub struct VolatilityIndicators;

impl VolatilityIndicators {
    /// 새로운 변동성 지표 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// 볼린저 밴드 계산.
    ///
    /// 중간 밴드 = SMA(n)
    /// 상단/하단 밴드 = 중간 밴드 ± k × 표준편차
    ///
    /// 표준편차는 중간 밴드와 같은 구간의 모표준편차입니다.
    /// 음수 `k`는 잘못된 입력으로 보고 빈 시퀀스를 반환합니다.
    pub fn bollinger_bands<'a>(&self, bars: &'a [Bar], period: usize, k: Decimal) -> Bollinger<'a> {
        let windows = if period == 0 || bars.len() < period || k.is_sign_negative() {
            None
        } else {
            Some(bars.windows(period))
        };

        Bollinger {
            windows,
            period: Decimal::from(period.max(1)),
            multiplier: k,
        }
    }
}
