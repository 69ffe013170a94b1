//! 도메인 모델.
//!
//! - `market_data` - 캔들, 시세, 펀더멘털과 이를 감싸는 `MarketData`
//! - `indicator` - 지표 포인트, 지표 명세, 지표 시리즈
//! - `request` - 조회 범위와 단건 조회 요청

pub mod indicator;
pub mod market_data;
pub mod request;

pub use indicator::*;
pub use market_data::*;
pub use request::*;
