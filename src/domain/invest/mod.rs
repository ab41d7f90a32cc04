//! Trading rules.
//!
//! Every rule shares the same position mechanics: sizing, opening at the
//! newest close, closing up a whole side, and stop-order loss cuts. Concrete
//! rules only decide *when* to open or close. Trailing variants wrap a rule in
//! [`Trailing`], which ratchets stops before the shared loss-cut runs.
//!
//! Windows handed to a rule are newest-first: `sticks[0]` is the bar being
//! traded.

pub mod buyhold;
pub mod golden;
pub mod random;
pub mod stepup;
pub mod turtle;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::candlestick::Candlestick;
use super::error::StocksimError;
use super::position::{History, InvestCondition, PositionType};
use super::rng::RandomSource;

pub use buyhold::BuyHoldRule;
pub use golden::{GoldenCrossRule, GoldenTrailLongRule};
pub use random::{RandomRule, RandomTrailLongRule};
pub use stepup::{SerialStepupTrailLongRule, StepupRule, TripleStepupTrailLongRule};
pub use turtle::TurtleRule;

/// Sizing and stop parameters shared by every rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleParams {
    /// Maximum number of concurrent long slots.
    pub unit_number: usize,
    /// Initial stop distance as a fraction of the entry price.
    pub losscut_rate: Decimal,
}

impl RuleParams {
    pub fn new(unit_number: usize, losscut_rate: Decimal) -> Self {
        RuleParams {
            unit_number,
            losscut_rate,
        }
    }
}

/// Outcome of an attempt to open a position.
#[derive(Debug, Clone, PartialEq)]
pub struct Opened {
    pub opened: bool,
    pub cash: Decimal,
}

/// Outcome of a close-up or loss-cut pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Closed {
    pub closed: bool,
    pub histories: Vec<History>,
    pub cash: Decimal,
}

impl Closed {
    fn nothing(cash: Decimal) -> Self {
        Closed {
            closed: false,
            histories: Vec::new(),
            cash,
        }
    }
}

pub trait InvestRule {
    fn params(&self) -> &RuleParams;

    /// Window length the simulator must feed.
    fn required_number_of_historical_data(&self) -> usize;

    fn reaching_have_long(&mut self, sticks: &[Candlestick], conditions: &[InvestCondition])
    -> bool;

    fn reaching_closedup_long(
        &mut self,
        _sticks: &[Candlestick],
        _conditions: &[InvestCondition],
    ) -> bool {
        false
    }

    fn reaching_have_short(
        &mut self,
        _sticks: &[Candlestick],
        _conditions: &[InvestCondition],
    ) -> bool {
        false
    }

    fn reaching_closedup_short(
        &mut self,
        _sticks: &[Candlestick],
        _conditions: &[InvestCondition],
    ) -> bool {
        false
    }

    fn exposure_unit(&self, conditions: &[InvestCondition], cash: Decimal) -> Decimal {
        exposure_unit(self.params(), conditions, cash)
    }

    fn have_long(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
        unit: Decimal,
    ) -> Opened {
        open_position(self.params(), PositionType::Long, sticks, conditions, cash, unit)
    }

    fn have_short(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
        unit: Decimal,
    ) -> Opened {
        open_position(self.params(), PositionType::Short, sticks, conditions, cash, unit)
    }

    fn closedup_long(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        close_up(PositionType::Long, sticks, conditions, cash)
    }

    fn closedup_short(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        close_up(PositionType::Short, sticks, conditions, cash)
    }

    fn losscut_long(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        losscut(PositionType::Long, sticks, conditions, cash)
    }

    fn losscut_short(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        losscut(PositionType::Short, sticks, conditions, cash)
    }
}

/// Capital for the next position: cash net of short notional, split over the
/// free slots. Shorts do not occupy a slot because their proceeds already sit
/// in cash.
pub fn exposure_unit(params: &RuleParams, conditions: &[InvestCondition], cash: Decimal) -> Decimal {
    let short_notional: Decimal = conditions
        .iter()
        .filter(|c| c.is_short())
        .map(InvestCondition::notional)
        .sum();
    let shorts = conditions.iter().filter(|c| c.is_short()).count();

    let available = params.unit_number as i64 - conditions.len() as i64 + shorts as i64;
    if available <= 0 {
        return Decimal::ZERO;
    }
    (cash - short_notional) / Decimal::from(available)
}

/// Open at the newest close with as many whole shares as `unit` buys.
pub fn open_position(
    params: &RuleParams,
    position_type: PositionType,
    sticks: &[Candlestick],
    conditions: &mut Vec<InvestCondition>,
    cash: Decimal,
    unit: Decimal,
) -> Opened {
    let not_opened = Opened {
        opened: false,
        cash,
    };
    let Some(newest) = sticks.first() else {
        return not_opened;
    };
    if newest.close <= Decimal::ZERO {
        return not_opened;
    }

    let volume = (unit / newest.close).floor().to_i64().unwrap_or(0);
    if volume <= 0 {
        return not_opened;
    }

    let price = newest.close;
    let notional = price * Decimal::from(volume);
    let (losscut_price, cash) = match position_type {
        PositionType::Long => (price * (Decimal::ONE - params.losscut_rate), cash - notional),
        PositionType::Short => (price * (Decimal::ONE + params.losscut_rate), cash + notional),
    };

    tracing::debug!(
        code = %newest.code,
        date = %newest.date,
        side = ?position_type,
        %price,
        volume,
        "position opened"
    );

    conditions.push(InvestCondition {
        position_type,
        price,
        volume,
        date: newest.date,
        losscut_price,
    });

    Opened { opened: true, cash }
}

/// Close every `position_type` condition at the newest close.
pub fn close_up(
    position_type: PositionType,
    sticks: &[Candlestick],
    conditions: &mut Vec<InvestCondition>,
    cash: Decimal,
) -> Closed {
    let Some(newest) = sticks.first() else {
        return Closed::nothing(cash);
    };
    settle(conditions, cash, |c| {
        (c.position_type == position_type).then(|| c.close(newest.close, newest.date))
    })
}

/// Close conditions whose stop the newest bar touched, filling at the stop.
pub fn losscut(
    position_type: PositionType,
    sticks: &[Candlestick],
    conditions: &mut Vec<InvestCondition>,
    cash: Decimal,
) -> Closed {
    let Some(newest) = sticks.first() else {
        return Closed::nothing(cash);
    };
    settle(conditions, cash, |c| {
        let touched = match (c.position_type, position_type) {
            (PositionType::Long, PositionType::Long) => newest.low <= c.losscut_price,
            (PositionType::Short, PositionType::Short) => newest.high >= c.losscut_price,
            _ => false,
        };
        touched.then(|| c.close(c.losscut_price, newest.date))
    })
}

/// Move stops toward the market, never away from it.
pub fn trail_stops(
    position_type: PositionType,
    params: &RuleParams,
    sticks: &[Candlestick],
    conditions: &mut [InvestCondition],
) {
    let Some(newest) = sticks.first() else {
        return;
    };
    for condition in conditions
        .iter_mut()
        .filter(|c| c.position_type == position_type)
    {
        match position_type {
            PositionType::Long => {
                let candidate = newest.low * (Decimal::ONE - params.losscut_rate);
                if candidate > condition.losscut_price {
                    condition.losscut_price = candidate;
                }
            }
            PositionType::Short => {
                let candidate = newest.high * (Decimal::ONE + params.losscut_rate);
                if candidate < condition.losscut_price {
                    condition.losscut_price = candidate;
                }
            }
        }
    }
}

/// Two-pass close: decide on every condition in order, then drop the closed
/// ones, keeping the survivors in their original order.
fn settle<F>(conditions: &mut Vec<InvestCondition>, cash: Decimal, decide: F) -> Closed
where
    F: Fn(&InvestCondition) -> Option<History>,
{
    let decisions: Vec<Option<History>> = conditions.iter().map(&decide).collect();
    if decisions.iter().all(Option::is_none) {
        return Closed::nothing(cash);
    }

    let mut cash = cash;
    let mut histories = Vec::new();
    let mut kept = Vec::with_capacity(conditions.len());
    for (condition, decision) in conditions.drain(..).zip(decisions) {
        match decision {
            Some(history) => {
                let proceeds = history.close_price * Decimal::from(history.volume);
                match history.position_type {
                    PositionType::Long => cash += proceeds,
                    PositionType::Short => cash -= proceeds,
                }
                tracing::debug!(
                    open_date = %history.open_date,
                    close_date = %history.close_date,
                    side = ?history.position_type,
                    profit = %history.profit(),
                    "position closed"
                );
                histories.push(history);
            }
            None => kept.push(condition),
        }
    }
    *conditions = kept;

    Closed {
        closed: true,
        histories,
        cash,
    }
}

/// Loss-cut decorator: ratchets stops on every pass before the shared
/// loss-cut, so a stop only ever moves in the position's favour.
pub struct Trailing<R> {
    inner: R,
}

impl<R: InvestRule> Trailing<R> {
    pub fn new(inner: R) -> Self {
        Trailing { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R: InvestRule> InvestRule for Trailing<R> {
    fn params(&self) -> &RuleParams {
        self.inner.params()
    }

    fn required_number_of_historical_data(&self) -> usize {
        self.inner.required_number_of_historical_data()
    }

    fn reaching_have_long(&mut self, sticks: &[Candlestick], conditions: &[InvestCondition]) -> bool {
        self.inner.reaching_have_long(sticks, conditions)
    }

    fn reaching_closedup_long(
        &mut self,
        sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        self.inner.reaching_closedup_long(sticks, conditions)
    }

    fn reaching_have_short(
        &mut self,
        sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        self.inner.reaching_have_short(sticks, conditions)
    }

    fn reaching_closedup_short(
        &mut self,
        sticks: &[Candlestick],
        conditions: &[InvestCondition],
    ) -> bool {
        self.inner.reaching_closedup_short(sticks, conditions)
    }

    fn exposure_unit(&self, conditions: &[InvestCondition], cash: Decimal) -> Decimal {
        self.inner.exposure_unit(conditions, cash)
    }

    fn have_long(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
        unit: Decimal,
    ) -> Opened {
        self.inner.have_long(sticks, conditions, cash, unit)
    }

    fn have_short(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
        unit: Decimal,
    ) -> Opened {
        self.inner.have_short(sticks, conditions, cash, unit)
    }

    fn closedup_long(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        self.inner.closedup_long(sticks, conditions, cash)
    }

    fn closedup_short(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        self.inner.closedup_short(sticks, conditions, cash)
    }

    fn losscut_long(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        trail_stops(PositionType::Long, self.params(), sticks, conditions);
        self.inner.losscut_long(sticks, conditions, cash)
    }

    fn losscut_short(
        &self,
        sticks: &[Candlestick],
        conditions: &mut Vec<InvestCondition>,
        cash: Decimal,
    ) -> Closed {
        trail_stops(PositionType::Short, self.params(), sticks, conditions);
        self.inner.losscut_short(sticks, conditions, cash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvestRuleType {
    Turtle,
    Random,
    RandomLong,
    RandomTrail,
    GoldenTrail,
    SerialStepupTrail,
    TripleStepupTrail,
    BuyHold,
}

impl InvestRuleType {
    pub const ALL: [InvestRuleType; 8] = [
        InvestRuleType::Turtle,
        InvestRuleType::Random,
        InvestRuleType::RandomLong,
        InvestRuleType::RandomTrail,
        InvestRuleType::GoldenTrail,
        InvestRuleType::SerialStepupTrail,
        InvestRuleType::TripleStepupTrail,
        InvestRuleType::BuyHold,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            InvestRuleType::Turtle => "turtle",
            InvestRuleType::Random => "random",
            InvestRuleType::RandomLong => "random_long",
            InvestRuleType::RandomTrail => "random_trail",
            InvestRuleType::GoldenTrail => "golden_trail",
            InvestRuleType::SerialStepupTrail => "serial_stepup_trail",
            InvestRuleType::TripleStepupTrail => "triple_stepup_trail",
            InvestRuleType::BuyHold => "buyhold",
        }
    }
}

impl fmt::Display for InvestRuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InvestRuleType {
    type Err = StocksimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        InvestRuleType::ALL
            .into_iter()
            .find(|t| t.name() == wanted)
            .ok_or_else(|| StocksimError::UnknownRule {
                name: s.to_string(),
            })
    }
}

/// Build a rule for the instruments in `bars`.
///
/// The universe-aware rules (random family, buy-and-hold) take their ticker
/// list and bar counts from `bars`.
pub fn build_rule(
    rule_type: InvestRuleType,
    params: RuleParams,
    bars: &BTreeMap<String, Vec<Candlestick>>,
    mut rng: Box<dyn RandomSource>,
) -> Box<dyn InvestRule> {
    let tickers: Vec<String> = bars.keys().cloned().collect();
    match rule_type {
        InvestRuleType::Turtle => Box::new(TurtleRule::new(params, rng)),
        InvestRuleType::Random => Box::new(RandomRule::new(params, tickers, rng)),
        InvestRuleType::RandomLong => Box::new(RandomRule::long(params, tickers, rng)),
        InvestRuleType::RandomTrail => Box::new(RandomRule::trail_long(params, tickers, rng)),
        InvestRuleType::GoldenTrail => Box::new(GoldenCrossRule::trail_long(params, rng)),
        InvestRuleType::SerialStepupTrail => Box::new(StepupRule::serial_trail_long(params, rng)),
        InvestRuleType::TripleStepupTrail => Box::new(StepupRule::triple_trail_long(params, rng)),
        InvestRuleType::BuyHold => {
            let stick_numbers: Vec<(String, usize)> = bars
                .iter()
                .map(|(code, sticks)| (code.clone(), sticks.len()))
                .collect();
            Box::new(BuyHoldRule::new(params, &stick_numbers, rng.as_mut()))
        }
    }
}
