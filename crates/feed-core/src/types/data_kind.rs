//! 데이터 종류 정의.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 구독 가능한 데이터 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataKind {
    /// 실시간 시세
    Realtime,
    /// 과거 캔들 데이터
    Historical,
    /// 펀더멘털 지표
    Fundamentals,
}

impl DataKind {
    /// 이 종류의 데이터가 저장되는 캐시 네임스페이스.
    pub fn namespace(&self) -> &'static str {
        match self {
            DataKind::Realtime => "realtime",
            DataKind::Historical => "historical",
            DataKind::Fundamentals => "fundamentals",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.namespace())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "realtime" => Ok(DataKind::Realtime),
            "historical" => Ok(DataKind::Historical),
            "fundamentals" => Ok(DataKind::Fundamentals),
            _ => Err(format!("Unknown data kind: {}", s)),
        }
    }
}
