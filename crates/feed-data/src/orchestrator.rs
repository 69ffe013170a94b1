//! 구독 기반 폴링 오케스트레이터.
//!
//! 여러 소비자가 각자 등록한 구독을 하나의 스케줄링 루프가 처리합니다.
//!
//! # 스케줄링 패스
//!
//! 1. 마지막 갱신 후 주기가 지난 구독을 고릅니다 (한 번도 갱신되지 않았으면 즉시).
//! 2. `(kind, interval)`로 묶고 심볼을 합칩니다. 겹치는 구독 N개도 저장소 호출은 한 번입니다.
//! 3. 합친 심볼을 `batch_size` 단위 청크로 나눠 동시에 조회합니다.
//! 4. 일시적 실패(`Transient`, `Server`)는 `retry_base_delay × 시도 횟수`만큼 쉬고 재시도합니다.
//! 5. 그룹이 끝나면 각 구독에 자기 심볼에 해당하는 결과만 전달합니다.
//! 6. `min(가장 짧은 주기 / 2, max_tick)` 후 다음 패스를 실행합니다.
//!
//! 활성 구독이 없으면 루프가 종료되고, 다음 `subscribe`/`resume`에서 다시 시작합니다.
//!
//! # 상태 전이
//!
//! ```text
//! Registered ──첫 패스──▶ Active ◀──resume── Paused
//!                          │ ──pause──▶
//!     (모든 상태) ──unsubscribe──▶ 제거 (종료 상태, id 재사용 없음)
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use feed_core::{
    symbol_set, DataKind, FeedConfig, FeedError, HistoryWindow, MarketData, PollConfig, Result,
    SymbolSet,
};
use futures::future::join_all;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::repository::DataRepository;

// =============================================================================
// 구독 타입
// =============================================================================

/// 구독 식별자. 단조 증가하며 재사용되지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 구독 해지 토큰. `unsubscribe`에 넘겨 구독을 취소합니다.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

/// 구독 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// 등록됨 (아직 한 번도 폴링되지 않음)
    Registered,
    /// 폴링 중
    Active,
    /// 일시 정지
    Paused,
}

/// 구독 콜백에 전달되는 갱신.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    /// 구독 심볼 중 조회에 성공한 데이터
    Data(HashMap<String, MarketData>),
    /// 재시도 후에도 실패한 청크 중 이 구독에 해당하는 심볼
    Error {
        symbols: Vec<String>,
        error: FeedError,
    },
}

/// 구독 콜백.
pub type SubscriptionCallback = Arc<dyn Fn(FeedUpdate) + Send + Sync>;

struct Subscription {
    symbols: SymbolSet,
    kind: DataKind,
    interval: Duration,
    callback: SubscriptionCallback,
    last_update_at: Option<Instant>,
    state: SubscriptionState,
}

impl Subscription {
    fn is_live(&self) -> bool {
        self.state != SubscriptionState::Paused
    }

    fn is_due(&self, now: Instant) -> bool {
        self.is_live()
            && self
                .last_update_at
                .map_or(true, |last| now.saturating_duration_since(last) >= self.interval)
    }
}

#[derive(Default)]
struct Registry {
    subscriptions: BTreeMap<SubscriptionId, Subscription>,
    next_id: u64,
    running: bool,
}

impl Registry {
    /// 콜백을 받을 수 있는 구독인지 (등록되어 있고 일시정지 상태가 아님).
    fn accepts_delivery(&self, id: &SubscriptionId) -> bool {
        self.subscriptions.get(id).is_some_and(Subscription::is_live)
    }

    fn has_live(&self) -> bool {
        self.subscriptions.values().any(Subscription::is_live)
    }

    fn shortest_live_interval(&self) -> Option<Duration> {
        self.subscriptions
            .values()
            .filter(|s| s.is_live())
            .map(|s| s.interval)
            .min()
    }

    /// 주기가 지난 구독을 `(kind, interval)` 그룹으로 묶습니다.
    fn collect_due(&mut self, now: Instant) -> Vec<GroupPlan> {
        let mut groups: BTreeMap<(DataKind, Duration), GroupPlan> = BTreeMap::new();

        for (id, sub) in self.subscriptions.iter_mut() {
            if !sub.is_due(now) {
                continue;
            }
            if sub.state == SubscriptionState::Registered {
                sub.state = SubscriptionState::Active;
            }

            let group = groups
                .entry((sub.kind, sub.interval))
                .or_insert_with(|| GroupPlan {
                    kind: sub.kind,
                    interval: sub.interval,
                    symbols: SymbolSet::new(),
                    members: Vec::new(),
                });
            group.symbols.extend(sub.symbols.iter().cloned());
            group.members.push(*id);
        }

        groups.into_values().collect()
    }
}

/// 한 패스 동안만 존재하는 구독 그룹.
#[derive(Debug)]
struct GroupPlan {
    kind: DataKind,
    interval: Duration,
    symbols: SymbolSet,
    members: Vec<SubscriptionId>,
}

/// 청크 하나의 조회 결과.
struct ChunkOutcome {
    symbols: Vec<String>,
    result: Result<HashMap<String, MarketData>>,
}

// =============================================================================
// 오케스트레이터
// =============================================================================

/// 오케스트레이터 설정.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_tick: Duration,
    /// 과거 데이터 구독이 조회할 범위
    pub history_window: HistoryWindow,
    /// 종류별 기본 폴링 주기
    pub poll: PollConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&FeedConfig::default())
    }
}

impl From<&FeedConfig> for OrchestratorConfig {
    fn from(config: &FeedConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            retry_base_delay: config.retry_base_delay(),
            max_tick: config.max_tick(),
            history_window: HistoryWindow::default(),
            poll: config.poll.clone(),
        }
    }
}

struct Inner {
    repository: Arc<DataRepository>,
    config: OrchestratorConfig,
    registry: Mutex<Registry>,
    wake: Notify,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 구독 기반 폴링 오케스트레이터.
///
/// 복제본은 같은 레지스트리와 루프를 공유합니다.
#[derive(Clone)]
pub struct PollingOrchestrator {
    inner: Arc<Inner>,
}

impl PollingOrchestrator {
    /// 새로운 오케스트레이터 생성.
    pub fn new(repository: Arc<DataRepository>, config: OrchestratorConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                repository,
                config,
                registry: Mutex::new(Registry::default()),
                wake: Notify::new(),
            }),
        }
    }

    /// 구독을 등록합니다.
    ///
    /// 심볼은 정규화되며, 빈 심볼 목록이나 0 주기는 설정 에러입니다.
    /// 등록하면 스케줄링 루프가 멈춰 있는 경우 다시 시작합니다.
    pub fn subscribe<F>(
        &self,
        symbols: &[String],
        kind: DataKind,
        interval: Duration,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        F: Fn(FeedUpdate) + Send + Sync + 'static,
    {
        let symbols = symbol_set(symbols);
        if symbols.is_empty() {
            return Err(FeedError::Config("구독할 심볼이 없습니다".to_string()));
        }
        if interval.is_zero() {
            return Err(FeedError::Config("구독 주기는 0보다 커야 합니다".to_string()));
        }

        let id = {
            let mut registry = self.inner.registry();
            registry.next_id += 1;
            let id = SubscriptionId(registry.next_id);
            registry.subscriptions.insert(
                id,
                Subscription {
                    symbols,
                    kind,
                    interval,
                    callback: Arc::new(callback),
                    last_update_at: None,
                    state: SubscriptionState::Registered,
                },
            );
            id
        };

        debug!(subscription = %id, kind = %kind, interval_ms = interval.as_millis() as u64, "구독 등록");
        self.ensure_running();
        Ok(SubscriptionHandle { id })
    }

    /// 설정된 종류별 기본 주기로 구독합니다.
    ///
    /// 과거 데이터처럼 기본 주기가 없는 종류는 설정 에러입니다.
    pub fn subscribe_with_default<F>(
        &self,
        symbols: &[String],
        kind: DataKind,
        callback: F,
    ) -> Result<SubscriptionHandle>
    where
        F: Fn(FeedUpdate) + Send + Sync + 'static,
    {
        let interval = self.inner.config.poll.interval_for(kind).ok_or_else(|| {
            FeedError::Config(format!("{} 데이터는 기본 폴링 주기가 없습니다", kind))
        })?;
        self.subscribe(symbols, kind, interval, callback)
    }

    /// 포트폴리오 시세를 포트폴리오 주기로 구독합니다.
    pub fn subscribe_portfolio<F>(&self, symbols: &[String], callback: F) -> Result<SubscriptionHandle>
    where
        F: Fn(FeedUpdate) + Send + Sync + 'static,
    {
        let interval = self.inner.config.poll.portfolio_interval();
        self.subscribe(symbols, DataKind::Realtime, interval, callback)
    }

    /// 구독을 해지합니다. 진행 중인 조회 결과는 더 이상 전달되지 않습니다.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let removed = self.inner.registry().subscriptions.remove(&handle.id).is_some();
        if removed {
            debug!(subscription = %handle.id, "구독 해지");
        }
        removed
    }

    /// 구독을 일시 정지합니다.
    pub fn pause(&self, handle: &SubscriptionHandle) -> bool {
        let mut registry = self.inner.registry();
        match registry.subscriptions.get_mut(&handle.id) {
            Some(sub) => {
                sub.state = SubscriptionState::Paused;
                true
            }
            None => false,
        }
    }

    /// 일시 정지한 구독을 재개합니다.
    pub fn resume(&self, handle: &SubscriptionHandle) -> bool {
        let resumed = {
            let mut registry = self.inner.registry();
            match registry.subscriptions.get_mut(&handle.id) {
                Some(sub) if sub.state == SubscriptionState::Paused => {
                    sub.state = SubscriptionState::Active;
                    true
                }
                Some(_) => true,
                None => false,
            }
        };

        if resumed {
            self.ensure_running();
        }
        resumed
    }

    /// 모든 구독을 해지하고 루프를 멈춥니다.
    pub fn shutdown(&self) {
        let removed = {
            let mut registry = self.inner.registry();
            let removed = registry.subscriptions.len();
            registry.subscriptions.clear();
            removed
        };
        self.inner.wake.notify_one();
        info!(removed = removed, "오케스트레이터 종료 요청");
    }

    /// 폴링 대상(Registered/Active) 구독 수.
    pub fn active_count(&self) -> usize {
        self.inner
            .registry()
            .subscriptions
            .values()
            .filter(|s| s.is_live())
            .count()
    }

    /// 구독 상태. 해지된 구독은 None.
    pub fn subscription_state(&self, handle: &SubscriptionHandle) -> Option<SubscriptionState> {
        self.inner
            .registry()
            .subscriptions
            .get(&handle.id)
            .map(|s| s.state)
    }

    /// 스케줄링 루프 실행 여부.
    pub fn is_running(&self) -> bool {
        self.inner.registry().running
    }

    fn ensure_running(&self) {
        let mut registry = self.inner.registry();
        if registry.running {
            drop(registry);
            self.inner.wake.notify_one();
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                registry.running = true;
                runtime.spawn(run_loop(self.inner.clone()));
            }
            Err(_) => {
                warn!("Tokio 런타임 밖에서 구독됨, 스케줄링 루프를 시작할 수 없음");
            }
        }
    }
}

// =============================================================================
// 스케줄링 루프
// =============================================================================

async fn run_loop(inner: Arc<Inner>) {
    info!("폴링 루프 시작");

    loop {
        let (groups, tick) = {
            let mut registry = inner.registry();
            if !registry.has_live() {
                registry.running = false;
                break;
            }

            let groups = registry.collect_due(Instant::now());
            let tick = registry
                .shortest_live_interval()
                .map_or(inner.config.max_tick, |shortest| {
                    (shortest / 2).min(inner.config.max_tick)
                });
            (groups, tick)
        };

        if !groups.is_empty() {
            debug!(groups = groups.len(), "스케줄링 패스");
            join_all(groups.into_iter().map(|group| run_group(&inner, group))).await;
        }

        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            _ = inner.wake.notified() => {}
        }
    }

    info!("폴링 루프 종료");
}

/// 그룹 하나를 조회하고 결과를 팬아웃합니다.
async fn run_group(inner: &Inner, group: GroupPlan) {
    let kind = group.kind;
    let max_age = poll_freshness(group.interval);
    let symbols: Vec<String> = group.symbols.into_iter().collect();
    let chunks: Vec<Vec<String>> = symbols
        .chunks(inner.config.batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect();

    debug!(
        kind = %kind,
        interval_ms = group.interval.as_millis() as u64,
        symbols = symbols.len(),
        chunks = chunks.len(),
        members = group.members.len(),
        "그룹 조회"
    );

    let outcomes = join_all(chunks.into_iter().map(|chunk| async move {
        let result = fetch_with_retry(inner, kind, max_age, &chunk).await;
        ChunkOutcome {
            symbols: chunk,
            result,
        }
    }))
    .await;

    fan_out(inner, &group.members, &outcomes);
}

/// 일시적 실패를 재시도하며 청크를 조회합니다.
async fn fetch_with_retry(
    inner: &Inner,
    kind: DataKind,
    max_age: Duration,
    chunk: &[String],
) -> Result<HashMap<String, MarketData>> {
    let max_retries = inner.config.max_retries;
    let window = &inner.config.history_window;
    let mut attempt: u32 = 1;

    loop {
        match fetch_chunk(&inner.repository, kind, max_age, chunk, window).await {
            Ok(data) => return Ok(data),
            Err(e) if e.is_retryable() && attempt <= max_retries => {
                let delay = retry_delay(inner.config.retry_base_delay, attempt);
                debug!(
                    kind = %kind,
                    symbols = ?chunk,
                    attempt = attempt,
                    max_retries = max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "청크 조회 재시도 예정"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(
                    kind = %kind,
                    symbols = ?chunk,
                    attempts = attempt,
                    error = %e,
                    "청크 조회 최종 실패"
                );
                return Err(e);
            }
        }
    }
}

/// 선형 백오프. 오버플로 시 `Duration::MAX`로 포화합니다.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(attempt).unwrap_or(Duration::MAX)
}

/// 그룹 조회에 허용할 캐시 나이.
///
/// 직전 주기에 저장된 값은 다음 주기에 적중하지 않고, 같은 패스에서 다른
/// 그룹이 방금 받은 값은 재사용됩니다.
fn poll_freshness(interval: Duration) -> Duration {
    interval / 2
}

async fn fetch_chunk(
    repository: &DataRepository,
    kind: DataKind,
    max_age: Duration,
    chunk: &[String],
    window: &HistoryWindow,
) -> Result<HashMap<String, MarketData>> {
    let data = match kind {
        DataKind::Realtime => repository
            .get_batch_within(chunk, max_age)
            .await?
            .into_iter()
            .map(|(symbol, quote)| (symbol, MarketData::Quote(quote)))
            .collect(),
        DataKind::Historical => repository
            .get_historical_batch_within(chunk, window, max_age)
            .await?
            .into_iter()
            .map(|(symbol, bars)| (symbol, MarketData::Bars(bars)))
            .collect(),
        DataKind::Fundamentals => repository
            .get_fundamentals_batch_within(chunk, max_age)
            .await?
            .into_iter()
            .map(|(symbol, fundamentals)| (symbol, MarketData::Fundamentals(fundamentals)))
            .collect(),
    };
    Ok(data)
}

/// 그룹 결과를 구성원별로 나눠 콜백을 호출합니다.
///
/// 레지스트리에 남아 있는 구독만 대상이며, 콜백은 락 밖에서 호출합니다.
/// 호출 직전에 다시 확인하므로 앞선 콜백이 해지하거나 일시정지한 구독은
/// 건너뜁니다.
fn fan_out(inner: &Inner, members: &[SubscriptionId], outcomes: &[ChunkOutcome]) {
    let deliveries: Vec<(SubscriptionId, SubscriptionCallback, Vec<FeedUpdate>)> = {
        let mut registry = inner.registry();
        let now = Instant::now();

        members
            .iter()
            .filter_map(|id| {
                let sub = registry.subscriptions.get_mut(id)?;
                if sub.state == SubscriptionState::Paused {
                    return None;
                }

                let mut data = HashMap::new();
                let mut updates = Vec::new();

                for outcome in outcomes {
                    match &outcome.result {
                        Ok(chunk_data) => {
                            for symbol in outcome.symbols.iter().filter(|s| sub.symbols.contains(*s)) {
                                if let Some(value) = chunk_data.get(symbol) {
                                    data.insert(symbol.clone(), value.clone());
                                }
                            }
                        }
                        Err(error) => {
                            let affected: Vec<String> = outcome
                                .symbols
                                .iter()
                                .filter(|s| sub.symbols.contains(*s))
                                .cloned()
                                .collect();
                            if !affected.is_empty() {
                                updates.push(FeedUpdate::Error {
                                    symbols: affected,
                                    error: error.clone(),
                                });
                            }
                        }
                    }
                }

                if !data.is_empty() {
                    updates.insert(0, FeedUpdate::Data(data));
                }
                sub.last_update_at = Some(now);

                Some((*id, sub.callback.clone(), updates))
            })
            .collect()
    };

    for (id, callback, updates) in deliveries {
        for update in updates {
            let accepts = inner.registry().accepts_delivery(&id);
            if !accepts {
                debug!(subscription = %id, "해지/일시정지된 구독, 전달 생략");
                break;
            }
            if catch_unwind(AssertUnwindSafe(|| callback(update))).is_err() {
                warn!(subscription = %id, "구독 콜백 패닉");
            }
        }
    }
}
