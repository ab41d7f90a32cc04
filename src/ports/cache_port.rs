//! Score cache port trait.
//!
//! A cache maps a ranking key to a set of `market:code` scores.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::domain::error::StocksimError;

pub trait CachePort {
    /// Empty when nothing is stored under `key`.
    fn get_scores(&self, key: &str) -> Result<BTreeMap<String, Decimal>, StocksimError>;

    /// Adds to whatever is already stored; call [`CachePort::clear`] first to replace.
    fn set_scores(&self, key: &str, scores: &BTreeMap<String, Decimal>) -> Result<(), StocksimError>;

    fn clear(&self, key: &str) -> Result<(), StocksimError>;
}
