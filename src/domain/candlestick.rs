//! Daily candlestick (bar) representation.

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use super::statistics::Statistics;

/// Fractional digits kept on every bar price.
pub const PRICE_SCALE: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interval {
    Daily,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Candlestick {
    pub code: String,
    pub market: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: i64,
    pub interval: Interval,
    /// Provenance marker for rewritten bars; ignored by equality.
    pub patched: bool,
}

/// Round half up to [`PRICE_SCALE`] digits.
pub fn round_price(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

impl Candlestick {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        code: &str,
        market: &str,
        date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
    ) -> Self {
        Candlestick {
            code: code.to_string(),
            market: market.to_string(),
            date,
            open: round_price(open),
            high: round_price(high),
            low: round_price(low),
            close: round_price(close),
            volume,
            interval: Interval::Daily,
            patched: false,
        }
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: Decimal) -> Decimal {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

impl PartialEq for Candlestick {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
            && self.market == other.market
            && self.date == other.date
            && self.open == other.open
            && self.high == other.high
            && self.low == other.low
            && self.close == other.close
            && self.volume == other.volume
            && self.interval == other.interval
    }
}

impl Eq for Candlestick {}

/// Average true range over newest-first bars.
///
/// The oldest bar has no predecessor, so its range is `high - low`.
pub fn average_true_range(bars: &[Candlestick], term: usize) -> Vec<Decimal> {
    let ranges: Vec<Decimal> = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match bars.get(i + 1) {
            Some(previous) => bar.true_range(previous.close),
            None => bar.high - bar.low,
        })
        .collect();
    Statistics::new(ranges).sma(term)
}

/// Rescale bars for a stock split where `present_price` became `newer_price`.
pub fn reflect_split(
    bars: &[Candlestick],
    present_price: Decimal,
    newer_price: Decimal,
) -> Vec<Candlestick> {
    if present_price.is_zero() || newer_price.is_zero() {
        return bars.to_vec();
    }
    let ratio = newer_price / present_price;

    bars.iter()
        .map(|bar| {
            let volume = (Decimal::from(bar.volume) / ratio)
                .trunc()
                .to_i64()
                .unwrap_or(bar.volume);
            let mut adjusted = Candlestick::new(
                &bar.code,
                &bar.market,
                bar.date,
                bar.open * ratio,
                bar.high * ratio,
                bar.low * ratio,
                bar.close * ratio,
                volume,
            );
            adjusted.interval = bar.interval;
            adjusted.patched = true;
            adjusted
        })
        .collect()
}
