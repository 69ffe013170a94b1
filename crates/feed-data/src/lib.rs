//! 시장 데이터 캐싱, 조회 및 구독 폴링.
//!
//! 이 crate는 다음을 제공합니다:
//! - 네임스페이스별 TTL 인메모리 캐시
//! - 캐시 우선 데이터 저장소 (stale 대체, 지표 로컬 계산 대체)
//! - 구독 기반 폴링 오케스트레이터 (중복 제거, 배치, 재시도, 팬아웃)
//! - 원격 시장 API fetch 협력자
//! - 위 구성 요소를 한데 묶는 `FeedContext`

pub mod cache;
pub mod context;
pub mod orchestrator;
pub mod provider;
pub mod repository;

#[cfg(test)]
mod testing;

pub use cache::{CacheEntry, CacheStats, MaxAge, TtlCache};
pub use context::FeedContext;
pub use orchestrator::{
    FeedUpdate, OrchestratorConfig, PollingOrchestrator, SubscriptionCallback, SubscriptionHandle,
    SubscriptionId, SubscriptionState,
};
pub use provider::{HttpMarketFetcher, MarketDataFetcher};
pub use repository::{normalize_bars, DataRepository, INDICATOR_NAMESPACE};
