//! 지표 조회 명령.

use anyhow::{Context, Result};
use feed_core::{DataRequest, HistoryWindow, IndicatorRequest, IndicatorSpec};
use feed_data::FeedContext;
use rust_decimal::Decimal;
use tracing::info;

use super::output::{print_market_data, OutputFormat};

/// 지표 조회 설정.
#[derive(Debug)]
pub struct IndicatorCommand {
    pub symbol: String,
    pub spec: IndicatorSpec,
    pub window: HistoryWindow,
    pub format: OutputFormat,
    pub limit: usize,
}

/// 이름과 선택적 파라미터로 지표 명세를 만듭니다.
///
/// 파라미터를 생략하면 지표별 기본값을 사용합니다.
/// MACD는 `fast,slow,signal`, 볼린저는 `period,k` 형식입니다.
pub fn parse_indicator(name: &str, params: Option<&str>) -> Result<IndicatorSpec> {
    let values: Vec<&str> = params
        .map(|p| p.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let period = |index: usize, default: usize| -> Result<usize> {
        match values.get(index) {
            Some(v) => v
                .parse::<usize>()
                .with_context(|| format!("Invalid period: {}", v)),
            None => Ok(default),
        }
    };

    let spec = match name.to_lowercase().as_str() {
        "sma" => IndicatorSpec::Sma { period: period(0, 20)? },
        "ema" => IndicatorSpec::Ema { period: period(0, 12)? },
        "rsi" => IndicatorSpec::Rsi { period: period(0, 14)? },
        "macd" => IndicatorSpec::Macd {
            fast: period(0, 12)?,
            slow: period(1, 26)?,
            signal: period(2, 9)?,
        },
        "bollinger" | "bb" => {
            let k = match values.get(1) {
                Some(v) => v
                    .parse::<Decimal>()
                    .with_context(|| format!("Invalid multiplier: {}", v))?,
                None => Decimal::TWO,
            };
            IndicatorSpec::Bollinger {
                period: period(0, 20)?,
                k,
            }
        }
        "vwap" => IndicatorSpec::Vwap,
        other => {
            return Err(anyhow::anyhow!(
                "Unknown indicator: {}. Supported: sma, ema, rsi, macd, bollinger, vwap",
                other
            ))
        }
    };
    Ok(spec)
}

/// 지표를 조회해 출력합니다.
pub async fn run(ctx: &FeedContext, command: IndicatorCommand) -> Result<()> {
    let request = DataRequest::Indicator {
        request: IndicatorRequest::new(command.spec, command.window),
    };

    let data = ctx
        .get_once(&command.symbol, &request)
        .await
        .with_context(|| format!("{} {} 조회 실패", command.symbol, command.spec))?;

    if let Some(series) = data.as_indicator() {
        info!(
            symbol = %series.symbol,
            indicator = %series.spec,
            derived = series.is_derived(),
            points = series.values.len(),
            "지표 조회 완료"
        );
    }

    print_market_data(&data, command.format, command.limit)
}
