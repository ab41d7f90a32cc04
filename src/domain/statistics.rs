//! Windowed statistics over decimal sequences.
//!
//! Windows slide along the sequence in the order given; the caller decides
//! whether that order is newest-first or oldest-first. Too-short inputs yield
//! empty results rather than errors.

use rust_decimal::{Decimal, MathematicalOps};

#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub top: Decimal,
    pub average: Decimal,
    pub bottom: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    values: Vec<Decimal>,
}

impl Statistics {
    pub fn new(values: Vec<Decimal>) -> Self {
        Statistics { values }
    }

    pub fn values(&self) -> &[Decimal] {
        &self.values
    }

    fn has_window(&self, term: usize) -> bool {
        term > 0 && self.values.len() >= term
    }

    /// Arithmetic mean of every `term`-long window.
    pub fn sma(&self, term: usize) -> Vec<Decimal> {
        if !self.has_window(term) {
            return Vec::new();
        }
        let divisor = Decimal::from(term);
        self.values
            .windows(term)
            .map(|window| window.iter().sum::<Decimal>() / divisor)
            .collect()
    }

    /// Weighted mean of every window, weights 1..=term along the sequence.
    ///
    /// With oldest-first input the newest value of each window weighs `term`.
    pub fn wma(&self, term: usize) -> Vec<Decimal> {
        if !self.has_window(term) {
            return Vec::new();
        }
        let divisor = Decimal::from(term * (term + 1) / 2);
        self.values
            .windows(term)
            .map(|window| {
                window
                    .iter()
                    .enumerate()
                    .map(|(j, value)| *value * Decimal::from(j + 1))
                    .sum::<Decimal>()
                    / divisor
            })
            .collect()
    }

    /// Exponential moving average seeded with the mean of the first window.
    pub fn ema(&self, term: usize) -> Vec<Decimal> {
        if !self.has_window(term) {
            return Vec::new();
        }
        let multiplier = Decimal::TWO / Decimal::from(term + 1);
        let seed = self.values[..term].iter().sum::<Decimal>() / Decimal::from(term);

        let mut result = Vec::with_capacity(self.values.len() - term + 1);
        result.push(seed);
        let mut last = seed;
        for value in &self.values[term..] {
            last += multiplier * (*value - last);
            result.push(last);
        }
        result
    }

    /// SMA with bands `percent` above and below.
    pub fn envelope_sma(&self, term: usize, percent: Decimal) -> Vec<Envelope> {
        let offset = percent / Decimal::ONE_HUNDRED;
        self.sma(term)
            .into_iter()
            .map(|average| Envelope {
                top: average * (Decimal::ONE + offset),
                average,
                bottom: average * (Decimal::ONE - offset),
            })
            .collect()
    }

    /// Population mean; zero for an empty sequence.
    pub fn mean(&self) -> Decimal {
        if self.values.is_empty() {
            return Decimal::ZERO;
        }
        self.values.iter().sum::<Decimal>() / Decimal::from(self.values.len())
    }

    /// Population variance; zero for an empty sequence.
    pub fn variance(&self) -> Decimal {
        if self.values.is_empty() {
            return Decimal::ZERO;
        }
        let mean = self.mean();
        self.values
            .iter()
            .map(|value| {
                let diff = *value - mean;
                diff * diff
            })
            .sum::<Decimal>()
            / Decimal::from(self.values.len())
    }

    pub fn standard_deviation(&self) -> Decimal {
        self.variance().sqrt().unwrap_or(Decimal::ZERO)
    }
}
