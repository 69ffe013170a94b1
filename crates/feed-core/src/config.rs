//! 설정 관리.
//!
//! 파이프라인이 인식하는 모든 옵션을 명시적인 구조체로 정의합니다.
//! 모든 필드에는 기본값이 있고, 알 수 없는 필드는 로드 시점에 거부됩니다.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{FeedError, Result};
use crate::types::DataKind;

/// 피드 파이프라인 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeedConfig {
    /// 청크당 최대 심볼 수
    pub batch_size: usize,
    /// 일시적 실패 시 추가 재시도 횟수
    pub max_retries: u32,
    /// 재시도 기본 대기 시간 (밀리초, 시도 횟수만큼 곱해짐)
    pub retry_base_delay_ms: u64,
    /// 스케줄링 루프 최대 재무장 간격 (밀리초)
    pub max_tick_ms: u64,
    /// 데이터 종류별 폴링 주기
    pub poll: PollConfig,
    /// 캐시 설정
    pub cache: CacheConfig,
    /// HTTP 협력자 설정
    pub http: HttpConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_retries: 3,
            retry_base_delay_ms: 2000,
            max_tick_ms: 1000,
            poll: PollConfig::default(),
            cache: CacheConfig::default(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// 데이터 종류별 폴링 주기.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    /// 실시간 시세 (밀리초)
    pub realtime_ms: u64,
    /// 과거 데이터 (없으면 요청 시에만 조회)
    pub historical_ms: Option<u64>,
    /// 펀더멘털 (밀리초)
    pub fundamentals_ms: u64,
    /// 포트폴리오 시세 (밀리초)
    pub portfolio_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            realtime_ms: 5_000,
            historical_ms: None,
            fundamentals_ms: 15_000,
            portfolio_ms: 30_000,
        }
    }
}

impl PollConfig {
    /// 데이터 종류의 기본 폴링 주기. 요청 시에만 조회하는 종류는 None.
    pub fn interval_for(&self, kind: DataKind) -> Option<Duration> {
        match kind {
            DataKind::Realtime => Some(Duration::from_millis(self.realtime_ms)),
            DataKind::Historical => self.historical_ms.map(Duration::from_millis),
            DataKind::Fundamentals => Some(Duration::from_millis(self.fundamentals_ms)),
        }
    }

    /// 포트폴리오 시세 폴링 주기.
    pub fn portfolio_interval(&self) -> Duration {
        Duration::from_millis(self.portfolio_ms)
    }
}

/// 캐시 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// 네임스페이스당 기본 최대 항목 수
    pub max_entries: usize,
    /// 네임스페이스별 최대 항목 수 오버라이드
    pub namespace_limits: HashMap<String, usize>,
    /// 실시간 시세 신선도 (초)
    pub realtime_ttl_secs: u64,
    /// 과거 데이터 신선도 (초)
    pub historical_ttl_secs: u64,
    /// 펀더멘털 신선도 (초)
    pub fundamentals_ttl_secs: u64,
    /// 지표 신선도 (초)
    pub indicator_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            namespace_limits: HashMap::new(),
            realtime_ttl_secs: 10,
            historical_ttl_secs: 300,
            fundamentals_ttl_secs: 3600,
            indicator_ttl_secs: 60,
        }
    }
}

impl CacheConfig {
    /// 네임스페이스의 최대 항목 수.
    pub fn limit_for(&self, namespace: &str) -> usize {
        self.namespace_limits
            .get(namespace)
            .copied()
            .unwrap_or(self.max_entries)
    }
}

/// HTTP 협력자 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct HttpConfig {
    /// 시장 API 기본 URL
    pub base_url: String,
    /// 요청 타임아웃 (밀리초)
    pub timeout_ms: u64,
    /// User-Agent 헤더
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            timeout_ms: 10_000,
            user_agent: format!("market-feed/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
    /// span 시작/종료 이벤트 출력
    pub span_events: bool,
    /// 파일명과 줄 번호 출력
    pub source_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            span_events: false,
            source_location: false,
        }
    }
}

/// 재시도 기본 대기 시간 상한 (10분).
pub const MAX_RETRY_BASE_DELAY_MS: u64 = 600_000;

impl FeedConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    ///
    /// 환경 변수는 `FEED__` 접두사와 `__` 구분자를 사용합니다
    /// (예: `FEED__CACHE__REALTIME_TTL_SECS=5`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("FEED")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let feed: FeedConfig = config.try_deserialize()?;
        feed.validate()?;
        Ok(feed)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from_str(s, config::FileFormat::Toml))
            .build()?;

        let feed: FeedConfig = config.try_deserialize()?;
        feed.validate()?;
        Ok(feed)
    }

    /// 값 범위를 검증합니다.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(FeedError::Config("batch_size는 0보다 커야 합니다".to_string()));
        }
        if self.max_tick_ms == 0 {
            return Err(FeedError::Config("max_tick_ms는 0보다 커야 합니다".to_string()));
        }
        if self.poll.realtime_ms == 0
            || self.poll.fundamentals_ms == 0
            || self.poll.portfolio_ms == 0
            || self.poll.historical_ms == Some(0)
        {
            return Err(FeedError::Config("폴링 주기는 0보다 커야 합니다".to_string()));
        }
        if self.cache.max_entries == 0 || self.cache.namespace_limits.values().any(|&v| v == 0) {
            return Err(FeedError::Config(
                "캐시 최대 항목 수는 0보다 커야 합니다".to_string(),
            ));
        }
        if self.retry_base_delay_ms > MAX_RETRY_BASE_DELAY_MS {
            return Err(FeedError::Config(format!(
                "retry_base_delay_ms는 {} 이하여야 합니다: {}",
                MAX_RETRY_BASE_DELAY_MS, self.retry_base_delay_ms
            )));
        }
        if self.http.timeout_ms == 0 {
            return Err(FeedError::Config("timeout_ms는 0보다 커야 합니다".to_string()));
        }
        Ok(())
    }

    /// 재시도 기본 대기 시간.
    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// 스케줄링 루프 최대 재무장 간격.
    pub fn max_tick(&self) -> Duration {
        Duration::from_millis(self.max_tick_ms)
    }
}
