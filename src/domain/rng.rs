//! Injectable random sources for strategies that gate signals on chance.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub trait RandomSource {
    /// A draw in `[0, 1)`.
    fn next_f64(&mut self) -> f64;

    /// A uniform index in `0..len`. `len` must be non-zero.
    fn next_index(&mut self, len: usize) -> usize {
        let index = (len as f64 * self.next_f64()) as usize;
        index.min(len.saturating_sub(1))
    }
}

/// `StdRng`-backed source, reproducible when built from a seed.
pub struct SeededRandom {
    rng: StdRng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        SeededRandom {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        SeededRandom {
            rng: StdRng::from_entropy(),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.rng.gen_range(0.0..1.0)
    }
}

/// Replays a fixed list of draws, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    draws: Vec<f64>,
    cursor: usize,
}

impl ScriptedRandom {
    pub fn new(draws: Vec<f64>) -> Self {
        ScriptedRandom { draws, cursor: 0 }
    }

    /// Every draw returns `value`.
    pub fn constant(value: f64) -> Self {
        ScriptedRandom::new(vec![value])
    }

    /// Number of draws consumed so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedRandom {
    fn next_f64(&mut self) -> f64 {
        if self.draws.is_empty() {
            return 0.0;
        }
        let value = self.draws[self.cursor % self.draws.len()];
        self.cursor += 1;
        value
    }
}
