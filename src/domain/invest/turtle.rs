//! Channel breakout: enter on a new 20-bar extreme, exit on a 10-bar one.

use super::{InvestRule, RuleParams};
use crate::domain::candlestick::Candlestick;
use crate::domain::position::{InvestCondition, has_long, has_short};
use crate::domain::rng::RandomSource;

const SETUP_TERM: usize = 20;
const CLOSEDUP_TERM: usize = 10;
const SETUP_RATE: f64 = 0.1;

pub struct TurtleRule {
    params: RuleParams,
    setup_term: usize,
    closedup_term: usize,
    setup_rate: f64,
    rng: Box<dyn RandomSource>,
}

impl TurtleRule {
    pub fn new(params: RuleParams, rng: Box<dyn RandomSource>) -> Self {
        TurtleRule {
            params,
            setup_term: SETUP_TERM,
            closedup_term: CLOSEDUP_TERM,
            setup_rate: SETUP_RATE,
            rng,
        }
    }

    fn chance(&mut self) -> bool {
        self.rng.next_f64() < self.setup_rate
    }
}

fn newest_is_max(sticks: &[Candlestick]) -> bool {
    match (sticks.first(), sticks.iter().map(|s| s.close).max()) {
        (Some(newest), Some(max)) => newest.close == max,
        _ => false,
    }
}

fn newest_is_min(sticks: &[Candlestick]) -> bool {
    match (sticks.first(), sticks.iter().map(|s| s.close).min()) {
        (Some(newest), Some(min)) => newest.close == min,
        _ => false,
    }
}

fn lookback(sticks: &[Candlestick], term: usize) -> &[Candlestick] {
    &sticks[..term.min(sticks.len())]
}

impl InvestRule for TurtleRule {
    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn required_number_of_historical_data(&self) -> usize {
        self.setup_term
    }

    fn reaching_have_long(&mut self, sticks: &[Candlestick], conditions: &[InvestCondition]) -> bool {
        !has_long(conditions)
            && sticks.len() >= self.setup_term
            && newest_is_max(lookback(sticks, self.setup_term))
            && self.chance()
    }

    fn reaching_have_short(
        &mut self,
        sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        !has_short(conditions)
            && sticks.len() >= self.setup_term
            && newest_is_min(lookback(sticks, self.setup_term))
            && self.chance()
    }

    fn reaching_closedup_long(
        &mut self,
        sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        has_long(conditions)
            && sticks.len() >= self.closedup_term
            && newest_is_min(lookback(sticks, self.closedup_term))
    }

    fn reaching_closedup_short(
        &mut self,
        sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        has_short(conditions)
            && sticks.len() >= self.closedup_term
            && newest_is_max(lookback(sticks, self.closedup_term))
    }
}
