//! 심볼 정규화.
//!
//! 소비자마다 "aapl", " AAPL " 처럼 다르게 넘겨주는 심볼을
//! 캐시 키와 그룹 병합에 쓸 수 있는 하나의 형태로 맞춥니다.

use std::collections::BTreeSet;

/// 정렬된 심볼 집합.
///
/// 구독 그룹의 심볼 합집합과 청크 분할 순서를 결정적으로 유지합니다.
pub type SymbolSet = BTreeSet<String>;

/// 심볼을 정규 형식(앞뒤 공백 제거, 대문자)으로 변환합니다.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// 심볼 목록을 정규화된 집합으로 변환합니다. 빈 문자열은 버립니다.
pub fn symbol_set<I, S>(symbols: I) -> SymbolSet
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    symbols
        .into_iter()
        .map(|s| normalize_symbol(s.as_ref()))
        .filter(|s| !s.is_empty())
        .collect()
}
