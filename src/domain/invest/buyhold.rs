//! Buy once at a pre-drawn bar and hold.

use std::collections::HashMap;

use super::{InvestRule, RuleParams};
use crate::domain::candlestick::Candlestick;
use crate::domain::position::{InvestCondition, has_long};
use crate::domain::rng::RandomSource;

pub struct BuyHoldRule {
    params: RuleParams,
    exec_indexes: HashMap<String, usize>,
    counters: HashMap<String, usize>,
}

impl BuyHoldRule {
    /// Draw `min(unit_number, instruments)` instruments from `stick_numbers`
    /// and, for each, the check count at which it buys.
    ///
    /// The source is only used here; signal checks are deterministic.
    pub fn new(
        params: RuleParams,
        stick_numbers: &[(String, usize)],
        rng: &mut dyn RandomSource,
    ) -> Self {
        let wanted = params.unit_number.min(stick_numbers.len());
        let mut remaining: Vec<&(String, usize)> = stick_numbers.iter().collect();
        let mut exec_indexes = HashMap::new();
        let mut counters = HashMap::new();

        while exec_indexes.len() < wanted && !remaining.is_empty() {
            let (ticker, numbers) = remaining.remove(rng.next_index(remaining.len()));
            let exec_index = (*numbers as f64 * rng.next_f64()) as usize;
            tracing::debug!(%ticker, exec_index, "buy-and-hold entry scheduled");
            exec_indexes.insert(ticker.clone(), exec_index);
            counters.insert(ticker.clone(), 0);
        }

        BuyHoldRule {
            params,
            exec_indexes,
            counters,
        }
    }

    pub fn exec_index(&self, ticker: &str) -> Option<usize> {
        self.exec_indexes.get(ticker).copied()
    }
}

impl InvestRule for BuyHoldRule {
    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn required_number_of_historical_data(&self) -> usize {
        1
    }

    fn reaching_have_long(&mut self, sticks: &[Candlestick], conditions: &[InvestCondition]) -> bool {
        if has_long(conditions) {
            return false;
        }
        let Some(newest) = sticks.first() else {
            return false;
        };
        let (Some(exec_index), Some(counter)) = (
            self.exec_indexes.get(&newest.code),
            self.counters.get_mut(&newest.code),
        ) else {
            return false;
        };
        let fire = *exec_index == *counter;
        *counter += 1;
        fire
    }
}
