//! # Feed Core
//!
//! 시장 데이터 피드 파이프라인의 핵심 도메인 모델 및 타입을 제공합니다.
//!
//! 이 크레이트는 파이프라인 전반에서 사용되는 기본 타입을 제공합니다:
//! - OHLCV 캔들, 실시간 시세, 펀더멘털 데이터 구조체
//! - 지표 포인트 및 지표 요청 정의
//! - 데이터 종류와 조회 범위
//! - 에러 분류 체계
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod types;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
pub use types::*;
