//! JSON REST 시장 API 클라이언트.
//!
//! # 엔드포인트
//!
//! | 메서드 | 경로 | 응답 |
//! |--------|------|------|
//! | GET | `/quote/{symbol}` | 시세 객체 |
//! | GET | `/quotes?symbols=A,B` | 시세 배열 |
//! | GET | `/history/{symbol}?days=&interval=` | 캔들 배열 (또는 `{"bars": [...]}`) |
//! | GET | `/indicators/{symbol}?name=&...` | 지표 포인트 배열 |
//! | GET | `/fundamentals/{symbol}` | 펀더멘털 객체 |
//!
//! 심볼은 경로 세그먼트로 퍼센트 인코딩됩니다 (`BTC/USDT` → `/quote/BTC%2FUSDT`).
//!
//! 필드 이름은 제공처마다 달라서 별칭을 허용합니다 (`o/h/l/c/v`, `t`/`time`).
//! 타임스탬프는 epoch 초, epoch 밀리초, RFC 3339 문자열을 모두 받습니다.
//!
//! # 상태 코드 매핑
//!
//! - 404 → `NotFound`
//! - 429, 타임아웃, 연결 실패 → `Transient`
//! - 5xx → `Server`
//! - 디코딩 실패 → `InvalidData`

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use feed_core::{
    Bar, BollingerPoint, FeedError, Fundamentals, HistoryWindow, HttpConfig, IndicatorPoint,
    IndicatorRequest, IndicatorSpec, IndicatorValues, MacdPoint, Quote, Result,
};
use reqwest::{StatusCode, Url};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use tracing::{debug, instrument};

use super::MarketDataFetcher;

/// 이 값 이상인 정수 타임스탬프는 밀리초로 해석 (2286년 이후의 초 단위 값).
const EPOCH_MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// JSON REST 시장 API 클라이언트.
#[derive(Debug, Clone)]
pub struct HttpMarketFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpMarketFetcher {
    /// 설정으로 클라이언트를 생성합니다.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FeedError::Config(format!("HTTP 클라이언트 생성 실패: {}", e)))?;

        Ok(Self {
            client,
            base_url: parse_base_url(&config.base_url)?,
        })
    }

    /// 기본 URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// 기본 URL 뒤에 세그먼트를 붙인 엔드포인트. 각 세그먼트는 인코딩됩니다.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| FeedError::Config(format!("경로를 붙일 수 없는 URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &path, &body));
        }

        let body = response.text().await.map_err(classify_request_error)?;
        debug!(path = %path, bytes = body.len(), "응답 수신");

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl MarketDataFetcher for HttpMarketFetcher {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_realtime(&self, symbol: &str) -> Result<Quote> {
        let dto: QuoteDto = self.get_json(&["quote", symbol], &[]).await?;
        Ok(dto.into_quote(symbol))
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_historical(&self, symbol: &str, window: &HistoryWindow) -> Result<Vec<Bar>> {
        let query = [
            ("days", window.days.to_string()),
            ("interval", window.interval.to_string()),
        ];
        let response: BarsResponse = self
            .get_json(&["history", symbol], &query)
            .await?;

        Ok(response.into_bars())
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_indicator(
        &self,
        symbol: &str,
        request: &IndicatorRequest,
    ) -> Result<IndicatorValues> {
        let query = indicator_query(request);
        let path = ["indicators", symbol];

        let values = match request.spec {
            IndicatorSpec::Bollinger { .. } => {
                let points: Vec<BollingerDto> = self.get_json(&path, &query).await?;
                IndicatorValues::Bollinger(points.into_iter().map(Into::into).collect())
            }
            IndicatorSpec::Macd { .. } => {
                let points: Vec<MacdDto> = self.get_json(&path, &query).await?;
                IndicatorValues::Macd(points.into_iter().map(Into::into).collect())
            }
            _ => {
                let points: Vec<PointDto> = self.get_json(&path, &query).await?;
                IndicatorValues::Single(points.into_iter().map(Into::into).collect())
            }
        };

        Ok(values)
    }

    #[instrument(skip(self), fields(base_url = %self.base_url))]
    async fn fetch_fundamentals(&self, symbol: &str) -> Result<Fundamentals> {
        let dto: FundamentalsDto = self
            .get_json(&["fundamentals", symbol], &[])
            .await?;
        Ok(dto.into_fundamentals(symbol))
    }

    #[instrument(skip(self), fields(base_url = %self.base_url, count = symbols.len()))]
    async fn fetch_batch_realtime(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let query = [("symbols", symbols.join(","))];
        let quotes: Vec<QuoteDto> = self.get_json(&["quotes"], &query).await?;

        Ok(quotes
            .into_iter()
            .filter_map(|dto| {
                let symbol = dto.symbol.clone()?;
                Some((symbol.clone(), dto.into_quote(&symbol)))
            })
            .collect())
    }
}

// =============================================================================
// 에러 분류
// =============================================================================

fn classify_request_error(err: reqwest::Error) -> FeedError {
    if err.is_timeout() {
        FeedError::Transient(format!("요청 타임아웃: {}", err))
    } else if err.is_connect() || err.is_request() {
        FeedError::Transient(format!("연결 실패: {}", err))
    } else if err.is_decode() || err.is_body() {
        FeedError::InvalidData(err.to_string())
    } else {
        FeedError::Unknown(err.to_string())
    }
}

fn parse_base_url(base_url: &str) -> Result<Url> {
    let url = Url::parse(base_url)
        .map_err(|e| FeedError::Config(format!("잘못된 기본 URL {}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(FeedError::Config(format!("경로를 붙일 수 없는 URL: {}", base_url)));
    }
    Ok(url)
}

fn classify_status(status: StatusCode, path: &str, body: &str) -> FeedError {
    let message = format!("{} [{}] {}", path, status, body.trim());

    match status {
        StatusCode::NOT_FOUND => FeedError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            FeedError::Transient(message)
        }
        s if s.is_server_error() => FeedError::Server(message),
        _ => FeedError::Unknown(message),
    }
}

fn indicator_query(request: &IndicatorRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("name", request.spec.name().to_string()),
        ("days", request.window.days.to_string()),
        ("interval", request.window.interval.to_string()),
    ];

    match request.spec {
        IndicatorSpec::Sma { period } | IndicatorSpec::Ema { period } | IndicatorSpec::Rsi { period } => {
            query.push(("period", period.to_string()));
        }
        IndicatorSpec::Macd { fast, slow, signal } => {
            query.push(("fast", fast.to_string()));
            query.push(("slow", slow.to_string()));
            query.push(("signal", signal.to_string()));
        }
        IndicatorSpec::Bollinger { period, k } => {
            query.push(("period", period.to_string()));
            query.push(("k", k.normalize().to_string()));
        }
        IndicatorSpec::Vwap => {}
    }

    query
}

// =============================================================================
// 응답 DTO
// =============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Int(i64),
    Float(f64),
    Text(String),
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = RawTimestamp::deserialize(deserializer)?;
    let parsed = match raw {
        RawTimestamp::Int(value) => from_epoch(value),
        RawTimestamp::Float(value) => from_epoch(value as i64),
        RawTimestamp::Text(text) => match text.parse::<i64>() {
            Ok(value) => from_epoch(value),
            Err(_) => DateTime::parse_from_rfc3339(&text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        },
    };

    parsed.ok_or_else(|| D::Error::custom("타임스탬프 형식 오류"))
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize_timestamp")] DateTime<Utc>);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

fn from_epoch(value: i64) -> Option<DateTime<Utc>> {
    if value.abs() >= EPOCH_MILLIS_THRESHOLD {
        Utc.timestamp_millis_opt(value).single()
    } else {
        Utc.timestamp_opt(value, 0).single()
    }
}

#[derive(Deserialize)]
struct QuoteDto {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(alias = "t", alias = "time", deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(alias = "o")]
    open: Decimal,
    #[serde(alias = "h")]
    high: Decimal,
    #[serde(alias = "l")]
    low: Decimal,
    #[serde(alias = "c", alias = "close", alias = "last")]
    price: Decimal,
    #[serde(alias = "v", default)]
    volume: Decimal,
    #[serde(alias = "pc", alias = "prev_close", alias = "previousClose", default)]
    previous_close: Option<Decimal>,
}

impl QuoteDto {
    fn into_quote(self, requested: &str) -> Quote {
        Quote {
            symbol: self.symbol.unwrap_or_else(|| requested.to_string()),
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            price: self.price,
            volume: self.volume,
            previous_close: self.previous_close,
        }
    }
}

#[derive(Deserialize)]
struct BarDto {
    #[serde(alias = "t", alias = "time", deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(alias = "o")]
    open: Decimal,
    #[serde(alias = "h")]
    high: Decimal,
    #[serde(alias = "l")]
    low: Decimal,
    #[serde(alias = "c")]
    close: Decimal,
    #[serde(alias = "v", default)]
    volume: Decimal,
}

impl From<BarDto> for Bar {
    fn from(dto: BarDto) -> Self {
        Bar::new(dto.timestamp, dto.open, dto.high, dto.low, dto.close, dto.volume)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BarsResponse {
    List(Vec<BarDto>),
    Wrapped { bars: Vec<BarDto> },
}

impl BarsResponse {
    fn into_bars(self) -> Vec<Bar> {
        let dtos = match self {
            BarsResponse::List(bars) | BarsResponse::Wrapped { bars } => bars,
        };
        dtos.into_iter().map(Bar::from).collect()
    }
}

#[derive(Deserialize)]
struct PointDto {
    #[serde(alias = "t", alias = "time", deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(alias = "v")]
    value: Decimal,
}

impl From<PointDto> for IndicatorPoint {
    fn from(dto: PointDto) -> Self {
        IndicatorPoint::new(dto.timestamp, dto.value)
    }
}

#[derive(Deserialize)]
struct BollingerDto {
    #[serde(alias = "t", alias = "time", deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    upper: Decimal,
    middle: Decimal,
    lower: Decimal,
}

impl From<BollingerDto> for BollingerPoint {
    fn from(dto: BollingerDto) -> Self {
        BollingerPoint {
            timestamp: dto.timestamp,
            upper: dto.upper,
            middle: dto.middle,
            lower: dto.lower,
        }
    }
}

#[derive(Deserialize)]
struct MacdDto {
    #[serde(alias = "t", alias = "time", deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    macd: Decimal,
    signal: Decimal,
    histogram: Decimal,
}

impl From<MacdDto> for MacdPoint {
    fn from(dto: MacdDto) -> Self {
        MacdPoint {
            timestamp: dto.timestamp,
            macd: dto.macd,
            signal: dto.signal,
            histogram: dto.histogram,
        }
    }
}

#[derive(Deserialize)]
struct FundamentalsDto {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(alias = "marketCap", default)]
    market_cap: Option<Decimal>,
    #[serde(alias = "pe", alias = "peRatio", default)]
    pe_ratio: Option<Decimal>,
    #[serde(default)]
    eps: Option<Decimal>,
    #[serde(alias = "dividendYield", default)]
    dividend_yield: Option<Decimal>,
    #[serde(alias = "fiftyTwoWeekHigh", alias = "high52", default)]
    week52_high: Option<Decimal>,
    #[serde(alias = "fiftyTwoWeekLow", alias = "low52", default)]
    week52_low: Option<Decimal>,
    #[serde(
        alias = "updatedAt",
        default,
        deserialize_with = "deserialize_optional_timestamp"
    )]
    updated_at: Option<DateTime<Utc>>,
}

impl FundamentalsDto {
    fn into_fundamentals(self, requested: &str) -> Fundamentals {
        Fundamentals {
            symbol: self.symbol.unwrap_or_else(|| requested.to_string()),
            market_cap: self.market_cap,
            pe_ratio: self.pe_ratio,
            eps: self.eps,
            dividend_yield: self.dividend_yield,
            week52_high: self.week52_high,
            week52_low: self.week52_low,
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
        }
    }
}
