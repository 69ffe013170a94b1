//! 단건 조회 명령.

use anyhow::{Context, Result};
use feed_core::{DataKind, DataRequest, HistoryWindow};
use feed_data::FeedContext;

use super::output::{print_market_data, OutputFormat};

/// 단건 조회 설정.
#[derive(Debug)]
pub struct OnceCommand {
    pub symbols: Vec<String>,
    pub kind: DataKind,
    pub window: HistoryWindow,
    pub format: OutputFormat,
    pub limit: usize,
}

/// 데이터 종류를 단건 조회 요청으로 변환합니다.
pub fn request_for(kind: DataKind, window: HistoryWindow) -> DataRequest {
    match kind {
        DataKind::Realtime => DataRequest::Realtime,
        DataKind::Historical => DataRequest::Historical { window },
        DataKind::Fundamentals => DataRequest::Fundamentals,
    }
}

/// 심볼별로 한 번씩 조회해 출력합니다. 실패한 심볼이 있으면 마지막에 에러를 반환합니다.
pub async fn run(ctx: &FeedContext, command: OnceCommand) -> Result<()> {
    let request = request_for(command.kind, command.window);
    let mut failed = Vec::new();

    for symbol in &command.symbols {
        match ctx.get_once(symbol, &request).await {
            Ok(data) => print_market_data(&data, command.format, command.limit)?,
            Err(e) => {
                eprintln!("{}: {}", symbol, e);
                failed.push(symbol.clone());
            }
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("조회 실패: {}", failed.join(", ")))
            .context(format!("{} 데이터 조회", command.kind))
    }
}
