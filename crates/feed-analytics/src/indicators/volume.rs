//! 거래량 기반 지표 (Volume-Based Indicators).
//!
//! ## VWAP (Volume Weighted Average Price)
//!
//! - Typical Price (TP) = (High + Low + Close) / 3
//! - VWAP = Σ(TP × Volume) / Σ(Volume)
//!
//! 주어진 구간의 첫 캔들부터 누적하며, 세션 경계에서 초기화하지 않습니다.

use feed_core::{Bar, IndicatorPoint};
use rust_decimal::Decimal;

/// VWAP 이터레이터. `volume.vwap()`로 생성합니다.
#[derive(Debug)]
pub struct Vwap<'a> {
    bars: std::slice::Iter<'a, Bar>,
    cumulative_pv: Decimal,
    cumulative_volume: Decimal,
}

impl Iterator for Vwap<'_> {
    type Item = IndicatorPoint;

    fn next(&mut self) -> Option<Self::Item> {
        for bar in self.bars.by_ref() {
            self.cumulative_pv += bar.typical_price() * bar.volume;
            self.cumulative_volume += bar.volume;

            // 누적 거래량이 0인 동안은 포인트 없음
            if !self.cumulative_volume.is_zero() {
                return Some(IndicatorPoint::new(
                    bar.timestamp,
                    self.cumulative_pv / self.cumulative_volume,
                ));
            }
        }
        None
    }
}

/// 거래량 지표 계산기.
#[derive(Debug, Default)]
pub struct VolumeIndicators;

impl VolumeIndicators {
    /// 새로운 거래량 지표 계산기 생성.
    pub fn new() -> Self {
        Self
    }

    /// 누적 VWAP 계산.
    pub fn vwap<'a>(&self, bars: &'a [Bar]) -> Vwap<'a> {
        Vwap {
            bars: bars.iter(),
            cumulative_pv: Decimal::ZERO,
            cumulative_volume: Decimal::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn bar(day: i64, high: Decimal, low: Decimal, close: Decimal, volume: Decimal) -> Bar {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        Bar::new(start + Duration::days(day), close, high, low, close, volume)
    }

    #[test]
    fn test_vwap_cumulative() {
        let volume = VolumeIndicators::new();
        let bars = vec![
            // TP = 10
            bar(0, dec!(11), dec!(9), dec!(10), dec!(100)),
            // TP = 20
            bar(1, dec!(21), dec!(19), dec!(20), dec!(300)),
        ];

        let vwap: Vec<_> = volume.vwap(&bars).map(|p| p.value).collect();

        // (10×100) / 100 = 10, (1000 + 20×300) / 400 = 17.5
        assert_eq!(vwap, vec![dec!(10), dec!(17.5)]);
    }

    #[test]
    fn test_vwap_skips_leading_zero_volume() {
        let volume = VolumeIndicators::new();
        let bars = vec![
            bar(0, dec!(11), dec!(9), dec!(10), dec!(0)),
            bar(1, dec!(21), dec!(19), dec!(20), dec!(50)),
        ];

        let vwap: Vec<_> = volume.vwap(&bars).collect();

        assert_eq!(vwap.len(), 1);
        assert_eq!(vwap[0].timestamp, bars[1].timestamp);
        assert_eq!(vwap[0].value, dec!(20));
    }

    #[test]
    fn test_vwap_restarts_from_slice_start() {
        let volume = VolumeIndicators::new();
        let bars = vec![
            bar(0, dec!(11), dec!(9), dec!(10), dec!(100)),
            bar(1, dec!(21), dec!(19), dec!(20), dec!(100)),
            bar(2, dec!(31), dec!(29), dec!(30), dec!(100)),
        ];

        let full: Vec<_> = volume.vwap(&bars).map(|p| p.value).collect();
        let tail: Vec<_> = volume.vwap(&bars[1..]).map(|p| p.value).collect();

        assert_eq!(full, vec![dec!(10), dec!(15), dec!(20)]);
        assert_eq!(tail, vec![dec!(20), dec!(25)]);
    }

    #[test]
    fn test_vwap_empty() {
        assert_eq!(VolumeIndicators::new().vwap(&[]).count(), 0);
    }
}
