//! Step-up entries: consecutive windows each trading higher than the last.

use rust_decimal::Decimal;

use super::{InvestRule, RuleParams, Trailing};
use crate::domain::candlestick::Candlestick;
use crate::domain::position::{InvestCondition, has_long};
use crate::domain::rng::RandomSource;

const TERM: usize = 3;
const NUMBER: usize = 3;
const SETUP_RATE: f64 = 0.1;

pub type SerialStepupTrailLongRule = Trailing<StepupRule>;
pub type TripleStepupTrailLongRule = Trailing<StepupRule>;

/// Splits the window into `number` blocks of `term` bars and requires the
/// block highs and lows to rise strictly from the oldest block to the
/// newest. The volume variant also requires each block's newest-first
/// volumes to compare greater, element by element, than the block before.
pub struct StepupRule {
    params: RuleParams,
    term: usize,
    number: usize,
    setup_rate: f64,
    volume_stepup: bool,
    rng: Box<dyn RandomSource>,
}

struct Block {
    high: Decimal,
    low: Decimal,
    /// Newest first, compared lexicographically.
    volumes: Vec<i64>,
}

fn strictly_increasing<T: PartialOrd>(values: &[T]) -> bool {
    values.windows(2).all(|pair| pair[0] < pair[1])
}

impl StepupRule {
    fn new(params: RuleParams, volume_stepup: bool, rng: Box<dyn RandomSource>) -> Self {
        StepupRule {
            params,
            term: TERM,
            number: NUMBER,
            setup_rate: SETUP_RATE,
            volume_stepup,
            rng,
        }
    }

    pub fn serial(params: RuleParams, rng: Box<dyn RandomSource>) -> Self {
        StepupRule::new(params, false, rng)
    }

    pub fn triple(params: RuleParams, rng: Box<dyn RandomSource>) -> Self {
        StepupRule::new(params, true, rng)
    }

    pub fn serial_trail_long(
        params: RuleParams,
        rng: Box<dyn RandomSource>,
    ) -> SerialStepupTrailLongRule {
        Trailing::new(StepupRule::serial(params, rng))
    }

    pub fn triple_trail_long(
        params: RuleParams,
        rng: Box<dyn RandomSource>,
    ) -> TripleStepupTrailLongRule {
        Trailing::new(StepupRule::triple(params, rng))
    }

    /// Blocks ordered oldest to newest. `sticks` is newest-first and exactly
    /// `term * number` long.
    fn blocks(&self, sticks: &[Candlestick]) -> Vec<Block> {
        (0..self.number)
            .filter_map(|i| {
                let window = &sticks[(self.number - i - 1) * self.term..(self.number - i) * self.term];
                Some(Block {
                    high: window.iter().map(|s| s.high).max()?,
                    low: window.iter().map(|s| s.low).min()?,
                    volumes: window.iter().map(|s| s.volume).collect(),
                })
            })
            .collect()
    }

    fn stepped_up(&self, sticks: &[Candlestick]) -> bool {
        if self.term == 0 || sticks.len() != self.term * self.number {
            return false;
        }
        let blocks = self.blocks(sticks);
        let highs: Vec<Decimal> = blocks.iter().map(|b| b.high).collect();
        let lows: Vec<Decimal> = blocks.iter().map(|b| b.low).collect();
        strictly_increasing(&highs) && strictly_increasing(&lows)
    }

    fn volumes_stepped_up(&self, sticks: &[Candlestick]) -> bool {
        let volumes: Vec<Vec<i64>> = self.blocks(sticks).into_iter().map(|b| b.volumes).collect();
        strictly_increasing(&volumes)
    }
}

impl InvestRule for StepupRule {
    fn params(&self) -> &RuleParams {
        &self.params
    }

    fn required_number_of_historical_data(&self) -> usize {
        self.term * self.number
    }

    fn reaching_have_long(&mut self, sticks: &[Candlestick], conditions: &[InvestCondition]) -> bool {
        if has_long(conditions) || !self.stepped_up(sticks) {
            return false;
        }
        // the draw is taken before the volume check
        let drawn = self.rng.next_f64() < self.setup_rate;
        drawn && (!self.volume_stepup || self.volumes_stepped_up(sticks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::invest::test_support::{day, sticks_from_closes};
    use crate::domain::rng::ScriptedRandom;
    use rust_decimal_macros::dec;

    fn params() -> RuleParams {
        RuleParams::new(10, dec!(0.1))
    }

    fn serial(draw: f64) -> SerialStepupTrailLongRule {
        StepupRule::serial_trail_long(params(), Box::new(ScriptedRandom::constant(draw)))
    }

    fn triple(draw: f64) -> TripleStepupTrailLongRule {
        StepupRule::triple_trail_long(params(), Box::new(ScriptedRandom::constant(draw)))
    }

    /// Nine newest-first bars climbing by one each day.
    fn staircase() -> Vec<Candlestick> {
        sticks_from_closes(&[19, 18, 17, 16, 15, 14, 13, 12, 11])
    }

    fn with_volumes(mut sticks: Vec<Candlestick>, volumes: &[i64]) -> Vec<Candlestick> {
        for (stick, volume) in sticks.iter_mut().zip(volumes) {
            stick.volume = *volume;
        }
        sticks
    }

    #[test]
    fn window_is_term_times_number() {
        assert_eq!(serial(0.0).required_number_of_historical_data(), 9);
        assert_eq!(triple(0.0).required_number_of_historical_data(), 9);
    }

    #[test]
    fn serial_fires_on_rising_blocks() {
        assert!(serial(0.05).reaching_have_long(&staircase(), &[]));
        assert!(!serial(0.5).reaching_have_long(&staircase(), &[]));
    }

    #[test]
    fn serial_rejects_flat_blocks() {
        let sticks = sticks_from_closes(&[10; 9]);
        assert!(!serial(0.0).reaching_have_long(&sticks, &[]));
    }

    #[test]
    fn serial_rejects_higher_high_with_lower_low() {
        let mut sticks = staircase();
        // deepen the newest block's low below the middle block's
        sticks[0].low = dec!(1);
        assert!(!serial(0.0).reaching_have_long(&sticks, &[]));
    }

    #[test]
    fn serial_needs_exact_window() {
        let sticks = sticks_from_closes(&[20, 19, 18, 17, 16, 15, 14, 13, 12, 11]);
        assert!(!serial(0.0).reaching_have_long(&sticks, &[]));
        assert!(!serial(0.0).reaching_have_long(&sticks[..8], &[]));
    }

    #[test]
    fn triple_needs_rising_volume() {
        // newest block first in the slice, so volume must grow toward index 0
        let rising = with_volumes(staircase(), &[300, 300, 300, 200, 200, 200, 100, 100, 100]);
        assert!(triple(0.0).reaching_have_long(&rising, &[]));

        let falling = with_volumes(staircase(), &[100, 100, 100, 200, 200, 200, 300, 300, 300]);
        assert!(!triple(0.0).reaching_have_long(&falling, &[]));
        assert!(serial(0.0).reaching_have_long(&falling, &[]));
    }

    #[test]
    fn triple_compares_volumes_bar_by_bar_not_by_total() {
        // blocks oldest to newest: [1,100,100], [2,0,0], [3,0,0], each newest first
        let sticks = with_volumes(staircase(), &[3, 0, 0, 2, 0, 0, 1, 100, 100]);
        assert!(triple(0.0).reaching_have_long(&sticks, &[]));

        let shrinking_lead = with_volumes(staircase(), &[1, 0, 0, 2, 0, 0, 3, 0, 0]);
        assert!(!triple(0.0).reaching_have_long(&shrinking_lead, &[]));
    }

    #[test]
    fn triple_draws_even_when_volume_fails() {
        let falling = with_volumes(staircase(), &[100, 100, 100, 200, 200, 200, 300, 300, 300]);
        let mut rule = StepupRule::triple(params(), Box::new(ScriptedRandom::new(vec![0.0, 0.9])));
        assert!(!rule.reaching_have_long(&falling, &[]));
        // the first draw was consumed above, so the second (0.9) blocks this one
        let rising = with_volumes(staircase(), &[300, 300, 300, 200, 200, 200, 100, 100, 100]);
        assert!(!rule.reaching_have_long(&rising, &[]));
        assert!(rule.reaching_have_long(&rising, &[]));
    }

    #[test]
    fn triple_with_equal_volume_is_rejected() {
        assert!(!triple(0.0).reaching_have_long(&staircase(), &[]));
    }

    #[test]
    fn open_long_blocks_entry() {
        let condition = InvestCondition {
            position_type: crate::domain::position::PositionType::Long,
            price: dec!(10),
            volume: 1,
            date: day(0),
            losscut_price: dec!(9),
        };
        assert!(!serial(0.0).reaching_have_long(&staircase(), &[condition]));
    }
}
