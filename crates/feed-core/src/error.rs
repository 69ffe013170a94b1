//! 피드 파이프라인의 에러 타입.
//!
//! 외부 fetch 협력자에서 올라오는 실패를 재시도 가능 여부에 따라 분류합니다.

use thiserror::Error;

/// 피드 파이프라인 에러.
///
/// 청크 실패를 여러 구독자에게 전달해야 하므로 `Clone`을 구현합니다.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// 캐시 미스 (내부용, 호출자에게 노출되지 않음)
    #[error("캐시 미스: {0}")]
    CacheMiss(String),

    /// 네트워크 실패, 타임아웃, 요청 한도 초과
    #[error("일시적 에러: {0}")]
    Transient(String),

    /// 존재하지 않는 심볼
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 업스트림 서버 에러 (5xx)
    #[error("서버 에러: {0}")]
    Server(String),

    /// 응답 형식 오류
    #[error("잘못된 데이터: {0}")]
    InvalidData(String),

    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 분류되지 않은 에러
    #[error("알 수 없는 에러: {0}")]
    Unknown(String),
}

/// 피드 작업을 위한 Result 타입.
pub type Result<T> = std::result::Result<T, FeedError>;

impl FeedError {
    /// 재시도 가능한 에러인지 확인합니다.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::Transient(_) | FeedError::Server(_))
    }

    /// 로깅용 에러 종류 이름.
    pub fn kind(&self) -> &'static str {
        match self {
            FeedError::CacheMiss(_) => "cache_miss",
            FeedError::Transient(_) => "transient",
            FeedError::NotFound(_) => "not_found",
            FeedError::Server(_) => "server",
            FeedError::InvalidData(_) => "invalid_data",
            FeedError::Config(_) => "config",
            FeedError::Unknown(_) => "unknown",
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::InvalidData(err.to_string())
    }
}

impl From<config::ConfigError> for FeedError {
    fn from(err: config::ConfigError) -> Self {
        FeedError::Config(err.to_string())
    }
}
