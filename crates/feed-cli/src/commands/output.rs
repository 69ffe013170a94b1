//! 조회 결과 출력.

use anyhow::Result;
use feed_core::{IndicatorSeries, IndicatorValues, MarketData};

/// 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!("Invalid format: {}. Use: table, json", s)),
        }
    }
}

/// 시장 데이터를 stdout에 출력합니다.
pub fn print_market_data(data: &MarketData, format: OutputFormat, limit: usize) -> Result<()> {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(data)?);
        return Ok(());
    }

    for line in table_lines(data, limit) {
        println!("{}", line);
    }
    Ok(())
}

/// 표 형식 출력 줄. 시계열은 최근 `limit`개만 남깁니다 (0 = 전체).
pub fn table_lines(data: &MarketData, limit: usize) -> Vec<String> {
    match data {
        MarketData::Quote(q) => {
            let change = q
                .change_percent()
                .map(|p| format!("{:+.2}%", p))
                .unwrap_or_else(|| "-".to_string());
            vec![
                format!("{:<8} {:>12} {:>10} {:>14}", "SYMBOL", "PRICE", "CHANGE", "VOLUME"),
                format!("{:<8} {:>12} {:>10} {:>14}", q.symbol, q.price, change, q.volume),
            ]
        }
        MarketData::Bars(bars) => {
            let mut lines = vec![format!(
                "{:<25} {:>10} {:>10} {:>10} {:>10} {:>12}",
                "TIME", "OPEN", "HIGH", "LOW", "CLOSE", "VOLUME"
            )];
            lines.extend(tail(bars, limit).iter().map(|b| {
                format!(
                    "{:<25} {:>10} {:>10} {:>10} {:>10} {:>12}",
                    b.timestamp.to_rfc3339(),
                    b.open,
                    b.high,
                    b.low,
                    b.close,
                    b.volume
                )
            }));
            lines
        }
        MarketData::Fundamentals(f) => {
            let field = |v: Option<rust_decimal::Decimal>| {
                v.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
            };
            vec![
                format!("종목: {}", f.symbol),
                format!("시가총액: {}", field(f.market_cap)),
                format!("PER: {}", field(f.pe_ratio)),
                format!("EPS: {}", field(f.eps)),
                format!("배당수익률: {}", field(f.dividend_yield)),
                format!("52주 최고/최저: {} / {}", field(f.week52_high), field(f.week52_low)),
                format!("기준 시각: {}", f.updated_at.to_rfc3339()),
            ]
        }
        MarketData::Indicator(series) => indicator_lines(series, limit),
    }
}

fn indicator_lines(series: &IndicatorSeries, limit: usize) -> Vec<String> {
    let mut lines = vec![format!(
        "{} {} ({:?}, {}개)",
        series.symbol,
        series.spec,
        series.source,
        series.values.len()
    )];

    match &series.values {
        IndicatorValues::Single(points) => {
            lines.extend(
                tail(points, limit)
                    .iter()
                    .map(|p| format!("{:<25} {:>14}", p.timestamp.to_rfc3339(), p.value.round_dp(4))),
            );
        }
        IndicatorValues::Bollinger(points) => {
            lines.extend(tail(points, limit).iter().map(|p| {
                format!(
                    "{:<25} {:>12} {:>12} {:>12}",
                    p.timestamp.to_rfc3339(),
                    p.upper.round_dp(4),
                    p.middle.round_dp(4),
                    p.lower.round_dp(4)
                )
            }));
        }
        IndicatorValues::Macd(points) => {
            lines.extend(tail(points, limit).iter().map(|p| {
                format!(
                    "{:<25} {:>12} {:>12} {:>12}",
                    p.timestamp.to_rfc3339(),
                    p.macd.round_dp(4),
                    p.signal.round_dp(4),
                    p.histogram.round_dp(4)
                )
            }));
        }
    }
    lines
}

fn tail<T>(items: &[T], limit: usize) -> &[T] {
    if limit == 0 || items.len() <= limit {
        items
    } else {
        &items[items.len() - limit..]
    }
}
