//! 시장 데이터 피드 CLI.
//!
//! # 사용 예시
//!
//! ```bash
//! # 실시간 시세 한 번 조회
//! feed once -s AAPL,MSFT
//!
//! # 최근 90일 일봉
//! feed once -s AAPL -k historical --days 90
//!
//! # RSI(14), 서버 실패 시 로컬 계산
//! feed indicator -s AAPL -n rsi
//!
//! # MACD(5,35,5) JSON 출력
//! feed indicator -s AAPL -n macd -p 5,35,5 --format json
//!
//! # 5초마다 시세 감시 (Ctrl+C로 종료)
//! feed watch -s AAPL,MSFT --interval-ms 5000
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feed_core::{init_logging, DataKind, FeedConfig, HistoryWindow, LogConfig, Timeframe};
use feed_data::{FeedContext, HttpMarketFetcher};
use tracing::{debug, info};

mod commands;

use commands::indicator::{parse_indicator, IndicatorCommand};
use commands::once::OnceCommand;
use commands::output::OutputFormat;
use commands::watch::WatchCommand;

#[derive(Parser)]
#[command(name = "feed")]
#[command(about = "Market data feed CLI - 캐시 우선 조회, 지표 계산, 구독 폴링", long_about = None)]
#[command(version)]
struct Cli {
    /// 설정 파일 (TOML). 없으면 기본값과 FEED__* 환경 변수만 사용
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// 로그 레벨 (설정 파일보다 우선)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 구독 없이 한 번 조회
    Once {
        /// 심볼 (쉼표로 구분, 예: AAPL,MSFT)
        #[arg(short, long)]
        symbols: String,

        /// 데이터 종류 (realtime, historical, fundamentals)
        #[arg(short, long, default_value = "realtime")]
        kind: String,

        /// 과거 데이터 조회 일수
        #[arg(long, default_value = "30")]
        days: u32,

        /// 캔들 간격 (1m, 5m, 15m, 30m, 1h, 4h, 1d, 1w)
        #[arg(short, long, default_value = "1d")]
        interval: String,

        /// 출력 형식 (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// 출력할 최근 항목 수 (0 = 전체)
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// 지표 조회 (서버 우선, 실패 시 로컬 계산)
    Indicator {
        /// 심볼
        #[arg(short, long)]
        symbol: String,

        /// 지표 이름 (sma, ema, rsi, macd, bollinger, vwap)
        #[arg(short, long)]
        name: String,

        /// 지표 파라미터 (쉼표로 구분, 예: 14 / 12,26,9 / 20,2)
        #[arg(short, long)]
        params: Option<String>,

        /// 계산에 사용할 과거 일수
        #[arg(long, default_value = "180")]
        days: u32,

        /// 캔들 간격
        #[arg(short, long, default_value = "1d")]
        interval: String,

        /// 출력 형식 (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,

        /// 출력할 최근 포인트 수 (0 = 전체)
        #[arg(long, default_value = "20")]
        limit: usize,
    },

    /// 구독 감시 (Ctrl+C까지)
    Watch {
        /// 심볼 (쉼표로 구분)
        #[arg(short, long)]
        symbols: String,

        /// 데이터 종류 (realtime, historical, fundamentals)
        #[arg(short, long, default_value = "realtime")]
        kind: String,

        /// 폴링 주기 (밀리초). 없으면 종류별 기본 주기
        #[arg(long)]
        interval_ms: Option<u64>,

        /// 포트폴리오 주기로 실시간 시세 감시
        #[arg(long, default_value = "false")]
        portfolio: bool,

        /// 출력 형식 (table, json)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

fn split_symbols(symbols: &str) -> Vec<String> {
    symbols
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_kind(kind: &str) -> Result<DataKind> {
    kind.parse::<DataKind>().map_err(anyhow::Error::msg)
}

fn parse_window(days: u32, interval: &str) -> Result<HistoryWindow> {
    let timeframe = interval.parse::<Timeframe>().map_err(anyhow::Error::msg)?;
    Ok(HistoryWindow::new(days, timeframe))
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env 파일 로드 (없으면 무시)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = FeedConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    let mut log_config = LogConfig::from(&config.logging);
    if let Some(level) = &cli.log_level {
        log_config.level = level.clone();
    }
    init_logging(log_config).map_err(|e| anyhow::anyhow!("로깅 초기화 실패: {}", e))?;

    debug!(base_url = %config.http.base_url, "설정 로드 완료");

    let fetcher = Arc::new(HttpMarketFetcher::new(&config.http)?);
    let ctx = FeedContext::new(config, fetcher)?;

    match cli.command {
        Commands::Once {
            symbols,
            kind,
            days,
            interval,
            format,
            limit,
        } => {
            let command = OnceCommand {
                symbols: split_symbols(&symbols),
                kind: parse_kind(&kind)?,
                window: parse_window(days, &interval)?,
                format: OutputFormat::parse(&format)?,
                limit,
            };
            commands::once::run(&ctx, command).await?;
        }

        Commands::Indicator {
            symbol,
            name,
            params,
            days,
            interval,
            format,
            limit,
        } => {
            let command = IndicatorCommand {
                symbol,
                spec: parse_indicator(&name, params.as_deref())?,
                window: parse_window(days, &interval)?,
                format: OutputFormat::parse(&format)?,
                limit,
            };
            commands::indicator::run(&ctx, command).await?;
        }

        Commands::Watch {
            symbols,
            kind,
            interval_ms,
            portfolio,
            format,
        } => {
            let command = WatchCommand {
                symbols: split_symbols(&symbols),
                kind: parse_kind(&kind)?,
                interval: interval_ms.map(Duration::from_millis),
                portfolio,
                format: OutputFormat::parse(&format)?,
            };
            commands::watch::run(&ctx, command).await?;
            info!("감시 종료");
        }
    }

    Ok(())
}
