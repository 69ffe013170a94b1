//! 구독 감시 명령 (Ctrl+C까지 실행).

use std::time::Duration;

use anyhow::Result;
use feed_core::DataKind;
use feed_data::{FeedContext, FeedUpdate};
use tracing::{info, warn};

use super::output::{table_lines, OutputFormat};

/// 감시 설정.
#[derive(Debug)]
pub struct WatchCommand {
    pub symbols: Vec<String>,
    pub kind: DataKind,
    /// 없으면 종류별 기본 주기
    pub interval: Option<Duration>,
    /// 포트폴리오 주기로 실시간 시세 구독
    pub portfolio: bool,
    pub format: OutputFormat,
}

fn print_update(update: FeedUpdate, format: OutputFormat) {
    match update {
        FeedUpdate::Data(data) => {
            let mut symbols: Vec<_> = data.keys().cloned().collect();
            symbols.sort();
            for symbol in symbols {
                let Some(value) = data.get(&symbol) else {
                    continue;
                };
                match format {
                    OutputFormat::Json => match serde_json::to_string(value) {
                        Ok(json) => println!("{}", json),
                        Err(e) => warn!(symbol = %symbol, error = %e, "JSON 직렬화 실패"),
                    },
                    OutputFormat::Table => {
                        for line in table_lines(value, 1) {
                            println!("{}", line);
                        }
                    }
                }
            }
        }
        FeedUpdate::Error { symbols, error } => {
            warn!(symbols = ?symbols, error = %error, "구독 조회 실패");
        }
    }
}

/// 구독을 등록하고 종료 신호까지 갱신을 출력합니다.
pub async fn run(ctx: &FeedContext, command: WatchCommand) -> Result<()> {
    let format = command.format;
    let callback = move |update| print_update(update, format);

    let handle = if command.portfolio {
        ctx.orchestrator().subscribe_portfolio(&command.symbols, callback)?
    } else {
        match command.interval {
            Some(interval) => ctx.subscribe(&command.symbols, command.kind, interval, callback)?,
            None => ctx
                .orchestrator()
                .subscribe_with_default(&command.symbols, command.kind, callback)?,
        }
    };

    info!(
        subscription = %handle.id(),
        symbols = ?command.symbols,
        kind = %command.kind,
        "=== 감시 시작 (Ctrl+C로 종료) ==="
    );

    tokio::signal::ctrl_c().await?;
    info!("종료 신호 수신, 구독 해지 중...");

    ctx.unsubscribe(&handle);
    ctx.shutdown();

    for (namespace, stats) in ctx.all_cache_stats() {
        info!(
            namespace = %namespace,
            hits = stats.hits,
            misses = stats.misses,
            size = stats.size,
            hit_rate = stats.hit_rate(),
            "캐시 통계"
        );
    }
    Ok(())
}
