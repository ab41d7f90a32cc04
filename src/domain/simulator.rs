//! Day-by-day simulation of one rule over many instruments sharing one cash
//! pool.
//!
//! Bars are newest-first. Offsets walk from the oldest full window toward the
//! newest, and within an offset instruments are visited in key order. Entry
//! and close-up signals are decided on the previous window and executed on the
//! current one, so no rule trades on the bar that produced its signal.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::candlestick::Candlestick;
use super::commission::Commission;
use super::invest::{Closed, InvestRule};
use super::position::{History, InvestCondition, PositionType};

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub principal: Decimal,
    pub current_valuation: Decimal,
    pub mean_profit: Decimal,
    pub mean_loss: Decimal,
    pub win_rate: Decimal,
    pub lose_rate: Decimal,
    pub payoff_ratio: Decimal,
    pub histories: BTreeMap<String, Vec<History>>,
    pub positions: BTreeMap<String, Vec<InvestCondition>>,
    pub commission: Decimal,
}

impl SimulationReport {
    /// Sum of closed-trade profits, before commission.
    pub fn total_profit(&self) -> Decimal {
        self.histories.values().flatten().map(History::profit).sum()
    }

    pub fn trade_count(&self) -> usize {
        self.histories.values().map(Vec::len).sum()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.values().map(Vec::len).sum()
    }
}

pub struct InvestSimulator<'a> {
    rule: &'a mut dyn InvestRule,
    sticks: &'a BTreeMap<String, Vec<Candlestick>>,
    commission: Commission,
    principal: Decimal,
    cash: Decimal,
    conditions: BTreeMap<String, Vec<InvestCondition>>,
    histories: BTreeMap<String, Vec<History>>,
}

impl<'a> InvestSimulator<'a> {
    pub fn new(
        rule: &'a mut dyn InvestRule,
        sticks: &'a BTreeMap<String, Vec<Candlestick>>,
        cash: Decimal,
        commission: Commission,
    ) -> Self {
        let conditions = sticks.keys().map(|code| (code.clone(), Vec::new())).collect();
        let histories = sticks.keys().map(|code| (code.clone(), Vec::new())).collect();
        InvestSimulator {
            rule,
            sticks,
            commission,
            principal: cash,
            cash,
            conditions,
            histories,
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn conditions(&self) -> &BTreeMap<String, Vec<InvestCondition>> {
        &self.conditions
    }

    pub fn histories(&self) -> &BTreeMap<String, Vec<History>> {
        &self.histories
    }

    pub fn simulate(&mut self) {
        let bars = self.sticks;
        let window = self.rule.required_number_of_historical_data();
        let max_sticks = bars.values().map(Vec::len).max().unwrap_or(0);
        let mut previous: BTreeMap<&str, usize> = BTreeMap::new();

        tracing::info!(
            instruments = bars.len(),
            window,
            offsets = max_sticks,
            principal = %self.principal,
            "simulation started"
        );

        for i in 0..max_sticks {
            for (code, sticks) in bars {
                let Some(start) = sticks.len().checked_sub(i + window) else {
                    continue;
                };
                let current = &sticks[start..start + window];
                let before: &[Candlestick] = match previous.get(code.as_str()) {
                    Some(s) => &sticks[*s..*s + window],
                    None => &[],
                };

                self.step(code, current, before);
                previous.insert(code.as_str(), start);
            }
        }

        tracing::info!(
            cash = %self.cash,
            trades = self.histories.values().map(Vec::len).sum::<usize>(),
            open = self.conditions.values().map(Vec::len).sum::<usize>(),
            "simulation finished"
        );
    }

    fn step(&mut self, code: &str, current: &[Candlestick], before: &[Candlestick]) {
        let all: Vec<InvestCondition> = self.conditions.values().flatten().cloned().collect();
        let unit = self.rule.exposure_unit(&all, self.cash);

        let conditions = self.conditions.entry(code.to_string()).or_default();
        let histories = self.histories.entry(code.to_string()).or_default();

        let closed = self.rule.losscut_long(current, conditions, self.cash);
        self.cash = settle(closed, histories);
        let closed = self.rule.losscut_short(current, conditions, self.cash);
        self.cash = settle(closed, histories);

        if self.rule.reaching_have_long(before, conditions.as_slice()) {
            self.cash = self.rule.have_long(current, conditions, self.cash, unit).cash;
        }
        if self.rule.reaching_have_short(before, conditions.as_slice()) {
            self.cash = self.rule.have_short(current, conditions, self.cash, unit).cash;
        }
        if self.rule.reaching_closedup_long(before, conditions.as_slice()) {
            let closed = self.rule.closedup_long(current, conditions, self.cash);
            self.cash = settle(closed, histories);
        }
        if self.rule.reaching_closedup_short(before, conditions.as_slice()) {
            let closed = self.rule.closedup_short(current, conditions, self.cash);
            self.cash = settle(closed, histories);
        }
    }

    /// Cash plus long value minus short liability at the given closes.
    /// Instruments without a latest bar are left out.
    pub fn evaluate(&self, latest: &BTreeMap<String, Candlestick>) -> Decimal {
        let mut valuation = self.cash;
        for (code, stick) in latest {
            for condition in self.conditions.get(code).into_iter().flatten() {
                match condition.position_type {
                    PositionType::Long => valuation += condition.market_value(stick.close),
                    PositionType::Short => valuation -= condition.market_value(stick.close),
                }
            }
        }
        valuation
    }

    fn profits(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.histories.values().flatten().map(History::profit)
    }

    /// Mean of the winning trades.
    pub fn mean_profit(&self) -> Decimal {
        mean(self.profits().filter(|p| *p > Decimal::ZERO))
    }

    /// Mean of the losing trades; negative or zero.
    pub fn mean_loss(&self) -> Decimal {
        mean(self.profits().filter(|p| *p < Decimal::ZERO))
    }

    pub fn payoff_ratio(&self) -> Decimal {
        let mean_loss = self.mean_loss();
        if mean_loss.is_zero() {
            return Decimal::ZERO;
        }
        self.mean_profit() / mean_loss.abs()
    }

    fn wins_and_losses(&self) -> (usize, usize) {
        self.profits().fold((0, 0), |(wins, losses), p| {
            if p > Decimal::ZERO {
                (wins + 1, losses)
            } else if p < Decimal::ZERO {
                (wins, losses + 1)
            } else {
                (wins, losses)
            }
        })
    }

    /// Winning share of decisive trades; break-even trades count for neither side.
    pub fn win_rate(&self) -> Decimal {
        let (wins, losses) = self.wins_and_losses();
        ratio(wins, wins + losses)
    }

    pub fn lose_rate(&self) -> Decimal {
        let (wins, losses) = self.wins_and_losses();
        ratio(losses, wins + losses)
    }

    /// Commission over both legs of every closed trade plus the entry leg of
    /// each position still open.
    pub fn commission_amount(&self) -> Decimal {
        let closed: Decimal = self
            .histories
            .values()
            .flatten()
            .map(|h| {
                let volume = Decimal::from(h.volume);
                self.commission.amount(h.open_price * volume)
                    + self.commission.amount(h.close_price * volume)
            })
            .sum();
        let open: Decimal = self
            .conditions
            .values()
            .flatten()
            .map(|c| self.commission.amount(c.notional()))
            .sum();
        closed + open
    }

    pub fn report(&self, latest: &BTreeMap<String, Candlestick>) -> SimulationReport {
        SimulationReport {
            principal: self.principal,
            current_valuation: self.evaluate(latest),
            mean_profit: self.mean_profit(),
            mean_loss: self.mean_loss(),
            win_rate: self.win_rate(),
            lose_rate: self.lose_rate(),
            payoff_ratio: self.payoff_ratio(),
            histories: self.histories.clone(),
            positions: self.conditions.clone(),
            commission: self.commission_amount(),
        }
    }
}

/// Append the closed trades and hand back the resulting cash.
fn settle(closed: Closed, histories: &mut Vec<History>) -> Decimal {
    histories.extend(closed.histories);
    closed.cash
}

fn mean(values: impl Iterator<Item = Decimal>) -> Decimal {
    let (sum, count) = values.fold((Decimal::ZERO, 0usize), |(sum, count), v| (sum + v, count + 1));
    ratio_of(sum, count)
}

fn ratio(numerator: usize, denominator: usize) -> Decimal {
    ratio_of(Decimal::from(numerator), denominator)
}

fn ratio_of(numerator: Decimal, denominator: usize) -> Decimal {
    if denominator == 0 {
        return Decimal::ZERO;
    }
    numerator / Decimal::from(denominator)
}

/// Newest bar of every non-empty series.
pub fn latest_bars(bars: &BTreeMap<String, Vec<Candlestick>>) -> BTreeMap<String, Candlestick> {
    bars.iter()
        .filter_map(|(code, sticks)| Some((code.clone(), sticks.first()?.clone())))
        .collect()
}

/// Run `rule` over `bars` from `cash` and report against the newest bars.
pub fn simulate(
    rule: &mut dyn InvestRule,
    bars: &BTreeMap<String, Vec<Candlestick>>,
    cash: Decimal,
    commission: Commission,
) -> SimulationReport {
    let mut simulator = InvestSimulator::new(rule, bars, cash, commission);
    simulator.simulate();
    simulator.report(&latest_bars(bars))
}
