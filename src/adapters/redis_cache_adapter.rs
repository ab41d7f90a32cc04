//! Redis score cache: one hash per key, scores stored as decimal strings.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use redis::Commands;
use rust_decimal::Decimal;

use crate::domain::error::StocksimError;
use crate::ports::cache_port::CachePort;
use crate::ports::config_port::ConfigPort;

pub struct RedisCacheAdapter {
    client: redis::Client,
}

fn cache_error(e: redis::RedisError) -> StocksimError {
    StocksimError::Cache {
        reason: e.to_string(),
    }
}

impl RedisCacheAdapter {
    pub fn new(url: &str) -> Result<Self, StocksimError> {
        let client = redis::Client::open(url).map_err(cache_error)?;
        Ok(Self { client })
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StocksimError> {
        let url = config
            .get_string("cache", "url")
            .ok_or_else(|| StocksimError::ConfigMissing {
                section: "cache".into(),
                key: "url".into(),
            })?;
        Self::new(&url)
    }

    fn connection(&self) -> Result<redis::Connection, StocksimError> {
        self.client.get_connection().map_err(cache_error)
    }
}

impl CachePort for RedisCacheAdapter {
    fn get_scores(&self, key: &str) -> Result<BTreeMap<String, Decimal>, StocksimError> {
        let mut con = self.connection()?;
        let raw: HashMap<String, String> = con.hgetall(key).map_err(cache_error)?;

        let mut scores = BTreeMap::new();
        for (field, value) in raw {
            let score = Decimal::from_str(&value).map_err(|e| StocksimError::Cache {
                reason: format!("invalid score for {field} under {key}: {e}"),
            })?;
            scores.insert(field, score);
        }
        tracing::debug!(%key, count = scores.len(), "scores read from redis");
        Ok(scores)
    }

    fn set_scores(&self, key: &str, scores: &BTreeMap<String, Decimal>) -> Result<(), StocksimError> {
        if scores.is_empty() {
            return Ok(());
        }
        let mut con = self.connection()?;
        let items: Vec<(String, String)> = scores
            .iter()
            .map(|(field, score)| (field.clone(), score.to_string()))
            .collect();
        con.hset_multiple::<_, _, _, ()>(key, &items).map_err(cache_error)?;
        tracing::debug!(%key, count = items.len(), "scores written to redis");
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), StocksimError> {
        let mut con = self.connection()?;
        con.del::<_, ()>(key).map_err(cache_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let result = RedisCacheAdapter::new("not a url");
        assert!(matches!(result, Err(StocksimError::Cache { .. })));
    }

    #[test]
    fn unreachable_server_is_a_cache_error() {
        // nothing listens on port 1
        let adapter = RedisCacheAdapter::new("redis://127.0.0.1:1/").unwrap();
        assert!(matches!(adapter.get_scores("rank"), Err(StocksimError::Cache { .. })));
    }
}
