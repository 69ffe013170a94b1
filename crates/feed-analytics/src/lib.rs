//! 지표 계산 엔진.
//!
//! 이 crate는 OHLCV 캔들 시퀀스에 대한 순수 함수형 기술적 지표를 제공합니다.
//! 서버 지표 응답의 소비자이자, 서버 지표 엔드포인트가 실패했을 때
//! 로컬 캔들로 같은 모양의 결과를 만들어 내는 대체 경로로 사용됩니다.

pub mod indicators;

pub use indicators::{
    EmaState, IndicatorEngine, MomentumCalculator, TrendIndicators, VolatilityIndicators,
    VolumeIndicators,
};
