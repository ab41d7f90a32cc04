//! Bar data access port trait.
//!
//! Every series comes back newest first. Writes are keyed by code, market
//! and date.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::candlestick::Candlestick;
use crate::domain::error::StocksimError;

pub trait BarPort {
    /// Bars of one instrument dated within `from..=to`.
    fn get(
        &self,
        code: &str,
        market: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candlestick>, StocksimError>;

    /// Codes on `market` carrying any of `tags`, or every code when `tags` is empty.
    fn list_codes(&self, market: &str, tags: &[String]) -> Result<Vec<String>, StocksimError>;

    /// Insert bars, replacing any stored bar with the same code, market and date.
    fn save_sticks(&self, sticks: &[Candlestick]) -> Result<(), StocksimError>;

    /// Replace every tag of one instrument.
    fn save_tags(&self, code: &str, market: &str, tags: &[String]) -> Result<(), StocksimError>;

    /// Bars of every instrument selected by [`BarPort::list_codes`].
    /// Instruments with no bars in range are left out.
    fn get_many(
        &self,
        market: &str,
        tags: &[String],
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<BTreeMap<String, Vec<Candlestick>>, StocksimError> {
        let mut result = BTreeMap::new();
        for code in self.list_codes(market, tags)? {
            let sticks = self.get(&code, market, from, to)?;
            if !sticks.is_empty() {
                result.insert(code, sticks);
            }
        }
        Ok(result)
    }

    /// The newest `limit` bars up to `to_date`, for one instrument when
    /// `code` is given and for the tag selection otherwise.
    fn get_window(
        &self,
        code: Option<&str>,
        market: &str,
        tags: &[String],
        limit: usize,
        to_date: NaiveDate,
    ) -> Result<BTreeMap<String, Vec<Candlestick>>, StocksimError> {
        let codes = match code {
            Some(code) => vec![code.to_string()],
            None => self.list_codes(market, tags)?,
        };
        let mut result = BTreeMap::new();
        for code in codes {
            let mut sticks = self.get(&code, market, NaiveDate::MIN, to_date)?;
            sticks.truncate(limit);
            if !sticks.is_empty() {
                result.insert(code, sticks);
            }
        }
        Ok(result)
    }
}
