//! Maintenance of stored bars and tags through a [`BarPort`]: file imports,
//! stock-split adjustment and the ATR lookup over stored history.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::candlestick::{Candlestick, average_true_range, reflect_split};
use crate::domain::error::StocksimError;
use crate::ports::bar_port::BarPort;

/// One instrument's tag list as read from an import file.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentTags {
    pub code: String,
    pub market: String,
    pub tags: Vec<String>,
}

/// A stored bar and an incoming bar for the same day that disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub present: Candlestick,
    pub newer: Candlestick,
}

fn stored_bar(bar_port: &dyn BarPort, stick: &Candlestick) -> Result<Option<Candlestick>, StocksimError> {
    match bar_port.get(&stick.code, &stick.market, stick.date, stick.date) {
        Ok(sticks) => Ok(sticks.into_iter().next()),
        Err(StocksimError::NoData { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Incoming bars whose day is already stored with different prices or volume.
pub fn find_conflicts(bar_port: &dyn BarPort, sticks: &[Candlestick]) -> Result<Vec<Conflict>, StocksimError> {
    let mut conflicts = Vec::new();
    for stick in sticks {
        if let Some(present) = stored_bar(bar_port, stick)? {
            if present != *stick {
                conflicts.push(Conflict {
                    present,
                    newer: stick.clone(),
                });
            }
        }
    }
    Ok(conflicts)
}

/// Save imported bars. In `safe` mode nothing is written when any bar would
/// overwrite a different stored one.
pub fn import_sticks(bar_port: &dyn BarPort, sticks: &[Candlestick], safe: bool) -> Result<usize, StocksimError> {
    if safe {
        let conflicts = find_conflicts(bar_port, sticks)?;
        if !conflicts.is_empty() {
            for c in &conflicts {
                tracing::warn!(
                    code = %c.newer.code,
                    market = %c.newer.market,
                    date = %c.newer.date,
                    present = %c.present.close,
                    newer = %c.newer.close,
                    "stored bar differs"
                );
            }
            return Err(StocksimError::Inconsistent {
                count: conflicts.len(),
            });
        }
    }
    bar_port.save_sticks(sticks)?;
    tracing::info!(count = sticks.len(), safe, "bars imported");
    Ok(sticks.len())
}

pub fn import_tags(bar_port: &dyn BarPort, entries: &[InstrumentTags]) -> Result<usize, StocksimError> {
    for entry in entries {
        bar_port.save_tags(&entry.code, &entry.market, &entry.tags)?;
    }
    tracing::info!(count = entries.len(), "tags imported");
    Ok(entries.len())
}

fn positive_price(name: &str, value: Decimal) -> Result<(), StocksimError> {
    if value <= Decimal::ZERO {
        return Err(StocksimError::InvalidArgument {
            name: name.into(),
            reason: format!("price must be positive, got {value}"),
        });
    }
    Ok(())
}

/// Rescale every stored bar up to `target_date` by `newer_price / present_price`
/// and write the adjusted bars back. Returns the number of bars rewritten.
pub fn apply_split(
    bar_port: &dyn BarPort,
    code: &str,
    market: &str,
    present_price: Decimal,
    newer_price: Decimal,
    target_date: NaiveDate,
) -> Result<usize, StocksimError> {
    positive_price("present price", present_price)?;
    positive_price("newer price", newer_price)?;

    let bars = bar_port.get(code, market, NaiveDate::MIN, target_date)?;
    if bars.is_empty() {
        return Err(StocksimError::NoData {
            code: code.to_string(),
            market: market.to_string(),
        });
    }
    let adjusted = reflect_split(&bars, present_price, newer_price);
    bar_port.save_sticks(&adjusted)?;
    tracing::info!(%code, %market, %target_date, bars = adjusted.len(), "split applied");
    Ok(adjusted.len())
}

/// Average true range of the newest `term` bars up to `today`.
pub fn average_atr(
    bar_port: &dyn BarPort,
    code: &str,
    market: &str,
    term: usize,
    today: NaiveDate,
) -> Result<Decimal, StocksimError> {
    if term == 0 {
        return Err(StocksimError::InvalidArgument {
            name: "term".into(),
            reason: "term must be at least 1".into(),
        });
    }
    let window = bar_port.get_window(Some(code), market, &[], term, today)?;
    window
        .get(code)
        .and_then(|sticks| average_true_range(sticks, term).first().copied())
        .ok_or_else(|| StocksimError::NoData {
            code: code.to_string(),
            market: market.to_string(),
        })
}
