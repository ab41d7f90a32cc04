//! In-process score cache.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use rust_decimal::Decimal;

use crate::domain::error::StocksimError;
use crate::ports::cache_port::CachePort;

#[derive(Default)]
pub struct MemoryCacheAdapter {
    entries: Mutex<HashMap<String, BTreeMap<String, Decimal>>>,
}

impl MemoryCacheAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, BTreeMap<String, Decimal>>) -> T,
    ) -> Result<T, StocksimError> {
        let mut entries = self.entries.lock().map_err(|e| StocksimError::Cache {
            reason: e.to_string(),
        })?;
        Ok(f(&mut entries))
    }
}

impl CachePort for MemoryCacheAdapter {
    fn get_scores(&self, key: &str) -> Result<BTreeMap<String, Decimal>, StocksimError> {
        self.with_entries(|entries| entries.get(key).cloned().unwrap_or_default())
    }

    fn set_scores(&self, key: &str, scores: &BTreeMap<String, Decimal>) -> Result<(), StocksimError> {
        self.with_entries(|entries| {
            entries
                .entry(key.to_string())
                .or_default()
                .extend(scores.iter().map(|(k, v)| (k.clone(), *v)));
        })
    }

    fn clear(&self, key: &str) -> Result<(), StocksimError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn missing_key_is_empty() {
        let cache = MemoryCacheAdapter::new();
        assert!(cache.get_scores("nothing").unwrap().is_empty());
    }

    #[test]
    fn set_merges_and_clear_removes() {
        let cache = MemoryCacheAdapter::new();
        cache
            .set_scores("rank", &BTreeMap::from([("NYSE:A".to_string(), dec!(1))]))
            .unwrap();
        cache
            .set_scores(
                "rank",
                &BTreeMap::from([("NYSE:A".to_string(), dec!(0.5)), ("NYSE:B".to_string(), dec!(0.25))]),
            )
            .unwrap();

        let scores = cache.get_scores("rank").unwrap();
        assert_eq!(scores["NYSE:A"], dec!(0.5));
        assert_eq!(scores["NYSE:B"], dec!(0.25));

        cache.clear("rank").unwrap();
        assert!(cache.get_scores("rank").unwrap().is_empty());
    }

    #[test]
    fn keys_are_independent() {
        let cache = MemoryCacheAdapter::new();
        cache
            .set_scores("a", &BTreeMap::from([("NYSE:A".to_string(), dec!(1))]))
            .unwrap();
        cache.clear("b").unwrap();
        assert_eq!(cache.get_scores("a").unwrap().len(), 1);
    }
}
