//! 조회 범위와 단건 조회 요청.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::indicator::IndicatorSpec;
use crate::types::{DataKind, Timeframe};

/// 과거 데이터 조회 범위 ("최근 N일, 간격 X").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HistoryWindow {
    /// 조회 일수
    pub days: u32,
    /// 캔들 간격
    pub interval: Timeframe,
}

impl HistoryWindow {
    pub fn new(days: u32, interval: Timeframe) -> Self {
        Self { days, interval }
    }

    /// 최근 N일 일봉.
    pub fn daily(days: u32) -> Self {
        Self::new(days, Timeframe::D1)
    }

    /// 캐시 키에 쓰이는 표현 (예: "1d:30").
    pub fn cache_key(&self) -> String {
        self.to_string()
    }
}

impl Default for HistoryWindow {
    fn default() -> Self {
        // 26/9 MACD와 20일 볼린저를 대체 계산하기에 충분한 길이
        Self::daily(180)
    }
}

impl fmt::Display for HistoryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.interval, self.days)
    }
}

/// 지표 조회 요청.
///
/// `window`는 서버 요청 범위이자, 서버 실패 시 대체 계산에 쓸 캔들 범위입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndicatorRequest {
    pub spec: IndicatorSpec,
    #[serde(default)]
    pub window: HistoryWindow,
}

impl IndicatorRequest {
    pub fn new(spec: IndicatorSpec, window: HistoryWindow) -> Self {
        Self { spec, window }
    }

    /// 캐시 키에 쓰이는 표현 (예: "rsi(14):1d:180").
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.spec.cache_key(), self.window.cache_key())
    }
}

impl From<IndicatorSpec> for IndicatorRequest {
    fn from(spec: IndicatorSpec) -> Self {
        Self::new(spec, HistoryWindow::default())
    }
}

/// 구독을 거치지 않는 단건 조회 요청.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataRequest {
    /// 실시간 시세
    Realtime,
    /// 과거 캔들
    Historical { window: HistoryWindow },
    /// 펀더멘털
    Fundamentals,
    /// 지표
    Indicator { request: IndicatorRequest },
}

impl DataRequest {
    /// 지표가 아닌 요청의 데이터 종류.
    pub fn kind(&self) -> Option<DataKind> {
        match self {
            DataRequest::Realtime => Some(DataKind::Realtime),
            DataRequest::Historical { .. } => Some(DataKind::Historical),
            DataRequest::Fundamentals => Some(DataKind::Fundamentals),
            DataRequest::Indicator { .. } => None,
        }
    }
}
