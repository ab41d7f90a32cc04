//! Random-entry rules, mostly useful as a baseline for the others.

use std::collections::HashMap;

use super::{InvestRule, RuleParams, Trailing};
use crate::domain::candlestick::Candlestick;
use crate::domain::position::{InvestCondition, PositionType, has_long, has_short};
use crate::domain::rng::RandomSource;

const SETUP_RATE: f64 = 0.1;
const CLOSEDUP_RATE: f64 = 0.1;
const BUY_RATIO: f64 = 0.5;

pub type RandomTrailLongRule = Trailing<RandomRule>;

/// Enters only instruments in a target set, with each target assigned a side.
///
/// The target set holds `min(unit_number, tickers)` instruments and is redrawn
/// every `target_number` signal checks.
pub struct RandomRule {
    params: RuleParams,
    setup_rate: f64,
    closedup_rate: f64,
    buy_ratio: f64,
    tickers: Vec<String>,
    targets: HashMap<String, PositionType>,
    target_number: usize,
    counter: usize,
    shorts_enabled: bool,
    closedup_enabled: bool,
    rng: Box<dyn RandomSource>,
}

impl RandomRule {
    pub fn new(params: RuleParams, tickers: Vec<String>, rng: Box<dyn RandomSource>) -> Self {
        RandomRule::with_buy_ratio(params, tickers, BUY_RATIO, rng)
    }

    pub fn with_buy_ratio(
        params: RuleParams,
        tickers: Vec<String>,
        buy_ratio: f64,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let target_number = params.unit_number.min(tickers.len());
        RandomRule {
            params,
            setup_rate: SETUP_RATE,
            closedup_rate: CLOSEDUP_RATE,
            buy_ratio,
            tickers,
            targets: HashMap::new(),
            target_number,
            counter: 0,
            shorts_enabled: true,
            closedup_enabled: true,
            rng,
        }
    }

    /// Long-only variant: every target is a long and shorts never fire.
    pub fn long(params: RuleParams, tickers: Vec<String>, rng: Box<dyn RandomSource>) -> Self {
        RandomRule {
            shorts_enabled: false,
            ..RandomRule::with_buy_ratio(params, tickers, 1.0, rng)
        }
    }

    /// Long-only entries held until the trailing stop takes them out.
    pub fn trail_long(
        params: RuleParams,
        tickers: Vec<String>,
        rng: Box<dyn RandomSource>,
    ) -> RandomTrailLongRule {
        Trailing::new(RandomRule {
            closedup_enabled: false,
            ..RandomRule::long(params, tickers, rng)
        })
    }

    pub fn targets(&self) -> &HashMap<String, PositionType> {
        &self.targets
    }

    fn reshuffle(&mut self) {
        self.targets.clear();
        let mut remaining = self.tickers.clone();
        while self.targets.len() < self.target_number && !remaining.is_empty() {
            let ticker = remaining.remove(self.rng.next_index(remaining.len()));
            let side = if self.rng.next_f64() < self.buy_ratio {
                PositionType::Long
            } else {
                PositionType::Short
            };
            self.targets.insert(ticker, side);
        }
        self.counter = 0;
        tracing::trace!(targets = self.targets.len(), "random targets redrawn");
    }

    fn is_target(&mut self, code: &str, side: PositionType) -> bool {
        if self.counter >= self.target_number {
            self.reshuffle();
        }
        self.counter += 1;
        self.targets.get(code) == Some(&side)
    }

    fn entry(&mut self, side: PositionType, sticks: &[Candlestick], already_open: bool) -> bool {
        let Some(newest) = sticks.first() else {
            return false;
        };
        if !self.is_target(&newest.code, side) || already_open {
            return false;
        }
        self.rng.next_f64() < self.setup_rate
    }
}

impl InvestRule for RandomRule {
    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn required_number_of_historical_data(&self) -> usize {
        1
    }

    fn reaching_have_long(&mut self, sticks: &[Candlestick], conditions: &[InvestCondition]) -> bool {
        self.entry(PositionType::Long, sticks, has_long(conditions))
    }

    fn reaching_closedup_long(
        &mut self,
        _sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        self.closedup_enabled && has_long(conditions) && self.rng.next_f64() < self.closedup_rate
    }

    fn reaching_have_short(
        &mut self,
        sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        self.shorts_enabled && self.entry(PositionType::Short, sticks, has_short(conditions))
    }

    fn reaching_closedup_short(
        &mut self,
        _sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        self.shorts_enabled
            && self.closedup_enabled
            && has_short(conditions)
            && self.rng.next_f64() < self.closedup_rate
    }
}
