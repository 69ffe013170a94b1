//! 네임스페이스별 TTL 캐시.
//!
//! 데이터 종류(realtime, historical, fundamentals, indicators)마다 독립된
//! 테이블을 두고, 각 테이블은 최대 항목 수로 제한됩니다.
//!
//! # 만료 정책
//!
//! 만료는 지연 방식입니다. 저장 시각만 기록하고, 읽는 쪽이 허용할 최대 나이를
//! 넘기면 미스로 처리합니다. 만료된 항목은 크기 초과 퇴출이나
//! `purge_expired`로만 제거되며, 백그라운드 타이머는 없습니다.
//!
//! # 퇴출 정책
//!
//! 테이블이 최대 항목 수를 넘으면 저장 시각이 가장 오래된 항목부터 제거합니다.
//! 덮어쓰기는 새로 저장한 것으로 취급합니다.

use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use feed_core::CacheConfig;
use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// 캐시 조회 시 허용하는 최대 나이.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAge {
    /// 저장 후 이 시간 이내의 값만 반환
    Within(Duration),
    /// 나이와 무관하게 반환 (장애 시 stale 대체용)
    Unbounded,
}

impl MaxAge {
    fn allows(&self, age: Duration) -> bool {
        match self {
            MaxAge::Within(max) => age <= *max,
            MaxAge::Unbounded => true,
        }
    }
}

impl From<Duration> for MaxAge {
    fn from(duration: Duration) -> Self {
        MaxAge::Within(duration)
    }
}

/// 네임스페이스 캐시 통계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheStats {
    /// 적중률 (조회가 없으면 0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            self.hits as f64 / total as f64
        } else {
            0.0
        }
    }
}

/// 캐시 항목.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub stored_at: Instant,
    pub namespace: String,
    seq: u64,
}

impl<V> CacheEntry<V> {
    /// 저장 후 경과 시간.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.stored_at)
    }
}

/// 네임스페이스 테이블.
#[derive(Debug)]
struct CacheNamespace<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// 저장 순서 (key, seq). 덮어쓰거나 삭제된 항목의 흔적은 퇴출 시 건너뜀
    order: VecDeque<(String, u64)>,
    hits: u64,
    misses: u64,
    max_entries: usize,
    next_seq: u64,
}

impl<V> CacheNamespace<V> {
    fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            hits: 0,
            misses: 0,
            max_entries: max_entries.max(1),
            next_seq: 0,
        }
    }

    fn is_live(&self, key: &str, seq: u64) -> bool {
        self.entries.get(key).is_some_and(|e| e.seq == seq)
    }

    fn evict_overflow(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.max_entries {
            let Some((key, seq)) = self.order.pop_front() else {
                break;
            };
            if self.is_live(&key, seq) {
                self.entries.remove(&key);
                evicted += 1;
            }
        }

        if self.order.len() > self.entries.len() * 2 + 16 {
            let entries = &self.entries;
            self.order
                .retain(|(key, seq)| entries.get(key).is_some_and(|e| e.seq == *seq));
        }

        evicted
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
        }
    }
}

/// 네임스페이스별 TTL 캐시.
///
/// 모든 연산은 동기이며 대기하지 않습니다. 테이블 변경은 락으로 보호되므로
/// 여러 태스크에서 공유할 수 있습니다.
#[derive(Debug)]
pub struct TtlCache<V> {
    namespaces: RwLock<HashMap<String, CacheNamespace<V>>>,
    config: CacheConfig,
}

impl<V: Clone> TtlCache<V> {
    /// 설정으로 캐시를 생성합니다.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// 모든 네임스페이스에 같은 최대 항목 수를 적용해 생성합니다.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self::new(CacheConfig {
            max_entries,
            ..CacheConfig::default()
        })
    }

    /// 값을 저장합니다. 같은 키는 무조건 덮어씁니다.
    pub fn set(&self, namespace: &str, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let table = namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| CacheNamespace::new(self.config.limit_for(namespace)));

        let seq = table.next_seq;
        table.next_seq += 1;
        table.order.push_back((key.clone(), seq));
        table.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                stored_at: Instant::now(),
                namespace: namespace.to_string(),
                seq,
            },
        );

        let evicted = table.evict_overflow();
        if evicted > 0 {
            debug!(namespace = namespace, evicted = evicted, "캐시 용량 초과, 오래된 항목 퇴출");
        }
    }

    /// 허용 나이 이내의 값을 조회합니다.
    pub fn get(&self, namespace: &str, key: &str, max_age: impl Into<MaxAge>) -> Option<V> {
        self.get_entry(namespace, key, max_age).map(|entry| entry.value)
    }

    /// 허용 나이 이내의 항목을 메타데이터와 함께 조회합니다.
    pub fn get_entry(
        &self,
        namespace: &str,
        key: &str,
        max_age: impl Into<MaxAge>,
    ) -> Option<CacheEntry<V>> {
        let max_age = max_age.into();
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let table = namespaces
            .entry(namespace.to_string())
            .or_insert_with(|| CacheNamespace::new(self.config.limit_for(namespace)));

        let found = table
            .entries
            .get(key)
            .filter(|entry| max_age.allows(entry.age()))
            .cloned();

        if found.is_some() {
            table.hits += 1;
        } else {
            table.misses += 1;
        }
        found
    }

    /// 네임스페이스의 모든 항목을 삭제하고 삭제 개수를 반환합니다.
    pub fn clear(&self, namespace: &str) -> usize {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        match namespaces.get_mut(namespace) {
            Some(table) => {
                let removed = table.entries.len();
                table.entries.clear();
                table.order.clear();
                removed
            }
            None => 0,
        }
    }

    /// 글롭 패턴(`*`, `?`)에 맞는 키를 삭제하고 삭제 개수를 반환합니다.
    pub fn clear_pattern(&self, namespace: &str, pattern: &str) -> usize {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let Some(table) = namespaces.get_mut(namespace) else {
            return 0;
        };

        let before = table.entries.len();
        table.entries.retain(|key, _| !glob_match(pattern, key));
        let removed = before - table.entries.len();

        if removed > 0 {
            debug!(namespace = namespace, pattern = pattern, removed = removed, "패턴 캐시 삭제");
        }
        removed
    }

    /// 허용 나이를 넘긴 항목을 제거하고 제거 개수를 반환합니다.
    pub fn purge_expired(&self, namespace: &str, max_age: Duration) -> usize {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        let Some(table) = namespaces.get_mut(namespace) else {
            return 0;
        };

        let before = table.entries.len();
        table.entries.retain(|_, entry| entry.age() <= max_age);
        before - table.entries.len()
    }

    /// 네임스페이스 통계.
    pub fn stats(&self, namespace: &str) -> CacheStats {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        namespaces
            .get(namespace)
            .map(CacheNamespace::stats)
            .unwrap_or_default()
    }

    /// 알려진 네임스페이스 목록 (정렬됨).
    pub fn namespaces(&self) -> Vec<String> {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = namespaces.keys().cloned().collect();
        names.sort();
        names
    }

    /// 모든 네임스페이스를 비웁니다. 통계는 유지됩니다.
    pub fn clear_all(&self) -> usize {
        let mut namespaces = self.namespaces.write().unwrap_or_else(PoisonError::into_inner);
        namespaces
            .values_mut()
            .map(|table| {
                let removed = table.entries.len();
                table.entries.clear();
                table.order.clear();
                removed
            })
            .sum()
    }
}

/// 글롭 매칭. `*`는 임의 길이 문자열, `?`는 한 글자.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // 마지막 `*`의 위치와 그때의 텍스트 위치
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((star_p, star_t)) = star {
            p = star_p + 1;
            t = star_t + 1;
            star = Some((star_p, star_t + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
