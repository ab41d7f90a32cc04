//! Golden-cross entry held under a trailing stop.

use rust_decimal::Decimal;

use super::{InvestRule, RuleParams, Trailing};
use crate::domain::candlestick::Candlestick;
use crate::domain::position::{InvestCondition, has_long};
use crate::domain::rng::RandomSource;
use crate::domain::statistics::Statistics;

const LONG_SMA_TERM: usize = 25;
const SHORT_SMA_TERM: usize = 5;
const SETUP_RATE: f64 = 0.1;

pub type GoldenTrailLongRule = Trailing<GoldenCrossRule>;

pub struct GoldenCrossRule {
    params: RuleParams,
    long_sma_term: usize,
    short_sma_term: usize,
    setup_rate: f64,
    rng: Box<dyn RandomSource>,
}

impl GoldenCrossRule {
    pub fn new(params: RuleParams, rng: Box<dyn RandomSource>) -> Self {
        GoldenCrossRule {
            params,
            long_sma_term: LONG_SMA_TERM,
            short_sma_term: SHORT_SMA_TERM,
            setup_rate: SETUP_RATE,
            rng,
        }
    }

    pub fn trail_long(params: RuleParams, rng: Box<dyn RandomSource>) -> GoldenTrailLongRule {
        Trailing::new(GoldenCrossRule::new(params, rng))
    }

    /// Newest long and short SMA over `sticks`, if both have a full window.
    fn newest_averages(&self, sticks: &[Candlestick]) -> Option<(Decimal, Decimal)> {
        let statistics = Statistics::new(sticks.iter().map(|s| s.close).collect());
        let long = statistics.sma(self.long_sma_term).first().copied()?;
        let short = statistics.sma(self.short_sma_term).first().copied()?;
        Some((long, short))
    }

    /// The long average was above the short one a bar ago and is not any more.
    fn crossed(&self, sticks: &[Candlestick]) -> bool {
        if sticks.is_empty() {
            return false;
        }
        match (self.newest_averages(&sticks[1..]), self.newest_averages(sticks)) {
            (Some((prev_long, prev_short)), Some((cur_long, cur_short))) => {
                prev_long > prev_short && cur_long <= cur_short
            }
            _ => false,
        }
    }
}

impl InvestRule for GoldenCrossRule {
    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn required_number_of_historical_data(&self) -> usize {
        self.long_sma_term + 1
    }

    fn reaching_have_long(&mut self, sticks: &[Candlestick], conditions: &[InvestCondition]) -> bool {
        !has_long(conditions) && self.crossed(sticks) && self.rng.next_f64() < self.setup_rate
    }
}
