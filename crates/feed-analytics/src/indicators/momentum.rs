//! 모멘텀 지표 (Momentum Indicators).
//!
//! 가격 모멘텀과 과매수/과매도 상태를 측정하는 지표를 제공합니다.
//! - RSI (Relative Strength Index, Wilder 평활)

use feed_core::{Bar, IndicatorPoint};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// RSI 이터레이터. `momentum.rsi()`로 생성합니다.
///
/// 첫 포인트는 캔들 인덱스 `period`에서 나옵니다.
#[derive(Debug)]
pub struct Rsi<'a> {
    bars: &'a [Bar],
    period: usize,
    next_index: usize,
    /// (평균 상승폭, 평균 하락폭)
    averages: Option<(Decimal, Decimal)>,
}

impl<'a> Rsi<'a> {
    fn new(bars: &'a [Bar], period: usize) -> Self {
        // 잘못된 입력이면 처음부터 소진된 상태로 시작
        let next_index = if period == 0 || bars.len() <= period {
            bars.len()
        } else {
            period
        };

        Self {
            bars,
            period,
            next_index,
            averages: None,
        }
    }

    fn delta(&self, index: usize) -> (Decimal, Decimal) {
        let change = self.bars[index].close - self.bars[index - 1].close;
        if change > Decimal::ZERO {
            (change, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -change)
        }
    }
}

impl Iterator for Rsi<'_> {
    type Item = IndicatorPoint;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_index >= self.bars.len() {
            return None;
        }

        let n = Decimal::from(self.period);
        let (avg_gain, avg_loss) = match self.averages {
            // 시드: 처음 n개 변화량의 평균
            None => {
                let (gain_sum, loss_sum) = (1..=self.period)
                    .map(|i| self.delta(i))
                    .fold((Decimal::ZERO, Decimal::ZERO), |(g, l), (dg, dl)| {
                        (g + dg, l + dl)
                    });
                (gain_sum / n, loss_sum / n)
            }
            // Wilder 평활: avg = (avg × (n-1) + x) / n
            Some((prev_gain, prev_loss)) => {
                let (gain, loss) = self.delta(self.next_index);
                let m = n - Decimal::ONE;
                ((prev_gain * m + gain) / n, (prev_loss * m + loss) / n)
            }
        };

        self.averages = Some((avg_gain, avg_loss));
        let timestamp = self.bars[self.next_index].timestamp;
        self.next_index += 1;

        Some(IndicatorPoint::new(timestamp, rsi_value(avg_gain, avg_loss)))
    }
}

/// RSI = 100 - (100 / (1 + RS)), RS = 평균 상승폭 / 평균 하락폭.
fn rsi_value(avg_gain: Decimal, avg_loss: Decimal) -> Decimal {
    if avg_loss.is_zero() {
        return dec!(100);
    }

    let rs = avg_gain / avg_loss;
    dec!(100) - dec!(100) / (Decimal::ONE + rs)
}

/// 모멘텀 지표 계산기.
#[derive(Debug, Default)]
pub struct MomentumCalculator;

impl MomentumCalculator {
    /// 새로운 모멘텀 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// RSI (Relative Strength Index) 계산.
    ///
    /// 처음 `period`개 변화량의 평균으로 시드한 뒤 Wilder 평활(계수 1/period)로
    /// 갱신합니다. 평균 하락폭이 0이면 100입니다.
    ///
    /// # 반환
    /// 0-100 사이의 RSI 값들 (캔들이 `period`개 이하이면 빈 시퀀스)
    pub fn rsi<'a>(&self, bars: &'a [Bar], period: usize) -> Rsi<'a> {
        Rsi::new(bars, period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::test_support::bars_from_closes;
    use proptest::prelude::*;

    #[test]
    fn test_rsi_strictly_increasing_is_100() {
        let calc = MomentumCalculator::new();
        let closes: Vec<_> = (1..=30).map(Decimal::from).collect();
        let bars = bars_from_closes(&closes);

        let rsi: Vec<_> = calc.rsi(&bars, 14).collect();

        assert_eq!(rsi.len(), 16);
        assert!(rsi.iter().all(|p| p.value == dec!(100)));
    }

    #[test]
    fn test_rsi_strictly_decreasing_is_0() {
        let calc = MomentumCalculator::new();
        let closes: Vec<_> = (1..=30).rev().map(Decimal::from).collect();
        let bars = bars_from_closes(&closes);

        for point in calc.rsi(&bars, 14) {
            assert_eq!(point.value, Decimal::ZERO);
        }
    }

    #[test]
    fn test_rsi_seed_and_wilder_update() {
        let calc = MomentumCalculator::new();
        // 변화량: +2, -1, +1, -2
        let bars = bars_from_closes(&[dec!(10), dec!(12), dec!(11), dec!(12), dec!(10)]);

        let rsi: Vec<_> = calc.rsi(&bars, 2).collect();

        assert_eq!(rsi.len(), 3);
        assert_eq!(rsi[0].timestamp, bars[2].timestamp);
        // 시드: gain = 1, loss = 0.5 → RS = 2 → 100 - 100/3
        assert_eq!(rsi[0].value, dec!(100) - dec!(100) / dec!(3));
        // gain = (1 + 1)/2 = 1, loss = (0.5 + 0)/2 = 0.25 → RS = 4 → 80
        assert_eq!(rsi[1].value, dec!(80));
        // gain = (1 + 0)/2 = 0.5, loss = (0.25 + 2)/2 = 1.125 → RS = 4/9 → 100 - 100×9/13
        assert_eq!(
            rsi[2].value,
            dec!(100) - dec!(100) / (Decimal::ONE + dec!(0.5) / dec!(1.125))
        );
    }

    #[test]
    fn test_rsi_insufficient_data() {
        let calc = MomentumCalculator::new();
        let bars = bars_from_closes(&[dec!(1), dec!(2), dec!(3)]);

        assert_eq!(calc.rsi(&bars, 3).count(), 0);
        assert_eq!(calc.rsi(&bars, 0).count(), 0);
        assert_eq!(calc.rsi(&bars, 2).count(), 1);
    }

    #[test]
    fn test_rsi_is_not_restartable() {
        let calc = MomentumCalculator::new();
        let closes: Vec<_> = (1..=20).map(Decimal::from).collect();
        let bars = bars_from_closes(&closes);

        let mut rsi = calc.rsi(&bars, 14);
        assert_eq!(rsi.by_ref().count(), 6);
        assert!(rsi.next().is_none());
    }

    proptest! {
        #[test]
        fn prop_rsi_bounded(
            raw in prop::collection::vec(1u32..10_000, 2..80),
            period in 1usize..30,
        ) {
            let closes: Vec<_> = raw.iter().map(|&c| Decimal::from(c) / dec!(10)).collect();
            let bars = bars_from_closes(&closes);

            for point in MomentumCalculator::new().rsi(&bars, period) {
                prop_assert!(point.value >= Decimal::ZERO);
                prop_assert!(point.value <= dec!(100));
            }
        }
    }
}
