//! Instrument selection for simulations and rankings.
//!
//! Parses code and tag lists from configuration, resolves them against a
//! [`BarPort`] and drops instruments that lack enough bars.

use std::collections::{BTreeMap, HashSet};

use crate::domain::candlestick::Candlestick;
use crate::domain::error::StocksimError;
use crate::ports::bar_port::BarPort;

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub codes: Vec<String>,
    pub market: String,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.codes.len()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),
}

impl From<UniverseError> for StocksimError {
    fn from(err: UniverseError) -> Self {
        StocksimError::ConfigInvalid {
            section: "simulation".into(),
            key: "codes".into(),
            reason: err.to_string(),
        }
    }
}

/// Upper-cased, de-duplicated codes in input order.
pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

/// Tags are free-form; blanks are ignored.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Explicit codes win; otherwise every code on `market` carrying a tag.
pub fn resolve_universe(
    bar_port: &dyn BarPort,
    market: &str,
    codes: Option<&str>,
    tags: &[String],
) -> Result<Universe, StocksimError> {
    let codes = match codes.map(str::trim).filter(|c| !c.is_empty()) {
        Some(list) => parse_codes(list)?,
        None => bar_port.list_codes(market, tags)?,
    };
    Ok(Universe {
        codes,
        market: market.to_string(),
    })
}

/// Keep the series holding at least `minimum` bars. Fails only when
/// nothing survives.
pub fn retain_sufficient(
    bars: BTreeMap<String, Vec<Candlestick>>,
    market: &str,
    minimum: usize,
) -> Result<BTreeMap<String, Vec<Candlestick>>, StocksimError> {
    let total = bars.len();
    let kept: BTreeMap<String, Vec<Candlestick>> = bars
        .into_iter()
        .filter(|(code, sticks)| {
            if sticks.len() < minimum {
                tracing::warn!(%code, %market, bars = sticks.len(), minimum, "skipped: insufficient bars");
                false
            } else {
                true
            }
        })
        .collect();

    if kept.is_empty() {
        return Err(StocksimError::NoData {
            code: "all".to_string(),
            market: market.to_string(),
        });
    }
    if kept.len() < total {
        tracing::info!(kept = kept.len(), total, %market, "universe narrowed");
    }
    Ok(kept)
}

/// The newest `limit` bars up to `to_date` of every instrument in the universe.
pub fn load_windows(
    bar_port: &dyn BarPort,
    universe: &Universe,
    limit: usize,
    to_date: chrono::NaiveDate,
) -> Result<BTreeMap<String, Vec<Candlestick>>, StocksimError> {
    let mut result = BTreeMap::new();
    for code in &universe.codes {
        let window = bar_port.get_window(Some(code), &universe.market, &[], limit, to_date)?;
        result.extend(window);
    }
    Ok(result)
}

/// Bars dated within `from..=to` of every instrument in the universe.
/// Instruments with nothing in range are left out.
pub fn load_range(
    bar_port: &dyn BarPort,
    universe: &Universe,
    from: chrono::NaiveDate,
    to: chrono::NaiveDate,
) -> Result<BTreeMap<String, Vec<Candlestick>>, StocksimError> {
    let mut result = BTreeMap::new();
    for code in &universe.codes {
        let sticks = bar_port.get(code, &universe.market, from, to)?;
        if sticks.is_empty() {
            tracing::warn!(%code, market = %universe.market, "skipped: no bars in range");
            continue;
        }
        result.insert(code.clone(), sticks);
    }
    Ok(result)
}
