//! 파이프라인 전반에서 사용되는 공통 타입.

mod data_kind;
mod symbol;
mod timeframe;

pub use data_kind::*;
pub use symbol::*;
pub use timeframe::*;
