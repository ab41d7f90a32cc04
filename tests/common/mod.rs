#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use stocksim::domain::candlestick::Candlestick;
use stocksim::domain::error::StocksimError;
use stocksim::ports::bar_port::BarPort;

pub const MARKET: &str = "NYSE";

/// Bars held newest-first per code, with optional tags and injected errors.
/// Writes land in the same maps.
pub struct MockBarPort {
    pub data: RefCell<BTreeMap<String, Vec<Candlestick>>>,
    pub tags: RefCell<HashMap<String, Vec<String>>>,
    pub errors: HashMap<String, String>,
}

impl MockBarPort {
    pub fn new() -> Self {
        Self {
            data: RefCell::new(BTreeMap::new()),
            tags: RefCell::new(HashMap::new()),
            errors: HashMap::new(),
        }
    }

    pub fn with_sticks(mut self, code: &str, sticks: Vec<Candlestick>) -> Self {
        self.data.get_mut().insert(code.to_string(), sticks);
        self
    }

    pub fn with_tags(mut self, code: &str, tags: &[&str]) -> Self {
        self.tags
            .get_mut()
            .insert(code.to_string(), tags.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl BarPort for MockBarPort {
    fn get(
        &self,
        code: &str,
        market: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Candlestick>, StocksimError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(StocksimError::Database {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .borrow()
            .get(code)
            .map(|sticks| {
                sticks
                    .iter()
                    .filter(|s| s.market == market && s.date >= from && s.date <= to)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_codes(&self, market: &str, tags: &[String]) -> Result<Vec<String>, StocksimError> {
        let own_tags = self.tags.borrow();
        Ok(self
            .data
            .borrow()
            .iter()
            .filter(|(_, sticks)| sticks.iter().any(|s| s.market == market))
            .filter(|(code, _)| {
                tags.is_empty()
                    || own_tags
                        .get(*code)
                        .is_some_and(|own| own.iter().any(|t| tags.contains(t)))
            })
            .map(|(code, _)| code.clone())
            .collect())
    }

    fn save_sticks(&self, sticks: &[Candlestick]) -> Result<(), StocksimError> {
        let mut data = self.data.borrow_mut();
        for stick in sticks {
            let series = data.entry(stick.code.clone()).or_default();
            series.retain(|s| s.market != stick.market || s.date != stick.date);
            series.push(stick.clone());
            series.sort_by(|a, b| b.date.cmp(&a.date));
        }
        Ok(())
    }

    fn save_tags(&self, code: &str, _market: &str, tags: &[String]) -> Result<(), StocksimError> {
        self.tags.borrow_mut().insert(code.to_string(), tags.to_vec());
        Ok(())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_stick(code: &str, date: NaiveDate, close: Decimal, volume: i64) -> Candlestick {
    Candlestick::new(
        code,
        MARKET,
        date,
        close,
        close + Decimal::ONE,
        close - Decimal::ONE,
        close,
        volume,
    )
}

/// Newest-first series from oldest-first closes, one bar per calendar day
/// starting at `start`.
pub fn series(code: &str, start: NaiveDate, closes: &[Decimal]) -> Vec<Candlestick> {
    let mut sticks: Vec<Candlestick> = closes
        .iter()
        .enumerate()
        .map(|(i, close)| make_stick(code, start + chrono::Duration::days(i as i64), *close, 1000))
        .collect();
    sticks.reverse();
    sticks
}

/// A linear ramp of `count` bars from `start_price` by `step` per day.
pub fn generate_sticks(
    code: &str,
    start: NaiveDate,
    count: usize,
    start_price: Decimal,
    step: Decimal,
) -> Vec<Candlestick> {
    let closes: Vec<Decimal> = (0..count)
        .map(|i| start_price + step * Decimal::from(i))
        .collect();
    series(code, start, &closes)
}

/// A zig-zag around `base` that swings by `amplitude` with the given period.
pub fn generate_wave(
    code: &str,
    start: NaiveDate,
    count: usize,
    base: Decimal,
    amplitude: Decimal,
    period: usize,
) -> Vec<Candlestick> {
    let closes: Vec<Decimal> = (0..count)
        .map(|i| {
            let phase = i % period;
            let half = period / 2;
            let distance = if phase <= half { phase } else { period - phase };
            base + amplitude * Decimal::from(distance) / Decimal::from(half.max(1))
        })
        .collect();
    series(code, start, &closes)
}
