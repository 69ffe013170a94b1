//! tracing 구독자 초기화.
//!
//! 설정 파일의 `[logging]` 섹션(또는 `FEED__LOGGING__*` 환경 변수)으로
//! 출력 형식을 고릅니다. `RUST_LOG`가 있으면 레벨 필터는 그쪽이 우선합니다.
//!
//! - **pretty**: 개발용, 여러 줄
//! - **json**: 로그 수집기용, 한 줄에 이벤트 하나
//! - **compact**: 터미널 감시(`feed watch`)용 한 줄 형식

use tracing::Subscriber;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 구독자 초기화 옵션. `LoggingConfig`에서 만들고 CLI 인자로 레벨만 덮어씁니다.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 레벨 필터 (예: "info", "feed_data=debug,info")
    pub level: String,
    pub format: LogFormat,
    /// `#[instrument]` span의 시작/종료 이벤트 출력
    pub span_events: bool,
    /// 파일명과 줄 번호 출력
    pub source_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from(&LoggingConfig::default())
    }
}

impl LogConfig {
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    fn span_filter(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// 형식에 맞는 fmt 레이어.
    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_span_events(self.span_filter());

        match self.format {
            LogFormat::Pretty => layer.pretty().boxed(),
            LogFormat::Json => layer.json().with_current_span(self.span_events).boxed(),
            LogFormat::Compact => layer.compact().with_target(false).boxed(),
        }
    }
}

/// 알 수 없는 형식 문자열은 pretty로 처리합니다.
impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
            span_events: config.span_events,
            source_location: config.source_location,
        }
    }
}

/// 전역 tracing 구독자를 설치합니다. 두 번째 호출은 에러입니다.
///
/// ```no_run
/// use feed_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("feed_data=debug").with_format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(config.fmt_layer())
        .try_init()?;

    tracing::debug!(format = ?config.format, level = %config.level, "로깅 초기화 완료");
    Ok(())
}
