//! Ranking records, relative strength and cache-score blending.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::candlestick::Candlestick;
use super::error::StocksimError;

/// Lookbacks, in sessions, used by the relative-strength score.
pub const RS_LOOKBACKS: [usize; 4] = [63, 126, 189, 252];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingOrder {
    Asc,
    Desc,
}

impl FromStr for RankingOrder {
    type Err = StocksimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(RankingOrder::Asc),
            "desc" => Ok(RankingOrder::Desc),
            other => Err(StocksimError::ConfigInvalid {
                section: "ranking".into(),
                key: "order".into(),
                reason: format!("expected asc or desc, got '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendType {
    Up,
    Down,
}

impl FromStr for TrendType {
    type Err = StocksimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(TrendType::Up),
            "down" => Ok(TrendType::Down),
            other => Err(StocksimError::ConfigInvalid {
                section: "trend".into(),
                key: "sort".into(),
                reason: format!("expected up or down, got '{other}'"),
            }),
        }
    }
}

/// Anything that ranks an instrument and can name it in a score cache.
pub trait Ranked {
    fn code(&self) -> &str;
    fn market(&self) -> &str;

    /// `market:code`, the key used in score caches.
    fn cache_key(&self) -> String {
        format!("{}:{}", self.market(), self.code())
    }
}

/// Base and present value of some measure for one instrument.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceData {
    pub code: String,
    pub market: String,
    pub base_value: Decimal,
    pub base_date: NaiveDate,
    pub present_value: Decimal,
    pub present_date: NaiveDate,
}

impl PerformanceData {
    /// `(present - base) / base`, zero when the base is zero.
    pub fn change_rate(&self) -> Decimal {
        if self.base_value.is_zero() {
            return Decimal::ZERO;
        }
        (self.present_value - self.base_value) / self.base_value
    }

    /// `present / base`, zero when the base is zero.
    pub fn rate(&self) -> Decimal {
        if self.base_value.is_zero() {
            return Decimal::ZERO;
        }
        self.present_value / self.base_value
    }
}

impl Ranked for PerformanceData {
    fn code(&self) -> &str {
        &self.code
    }

    fn market(&self) -> &str {
        &self.market
    }
}

/// Up and down band crossings counted over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendData {
    pub code: String,
    pub market: String,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub up: usize,
    pub down: usize,
}

impl TrendData {
    pub fn count(&self, trend: TrendType) -> usize {
        match trend {
            TrendType::Up => self.up,
            TrendType::Down => self.down,
        }
    }
}

impl Ranked for TrendData {
    fn code(&self) -> &str {
        &self.code
    }

    fn market(&self) -> &str {
        &self.market
    }
}

/// Today's bar with the bars 63, 126, 189 and 252 sessions earlier.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScore {
    pub code: String,
    pub market: String,
    pub stick: Candlestick,
    pub stick63: Candlestick,
    pub stick126: Candlestick,
    pub stick189: Candlestick,
    pub stick252: Candlestick,
}

fn close_ratio(close: Decimal, base: &Candlestick) -> Decimal {
    if base.close.is_zero() {
        return Decimal::ZERO;
    }
    close / base.close
}

impl RawScore {
    /// Build from a newest-first series holding at least 253 bars.
    pub fn from_series(sticks: &[Candlestick]) -> Option<RawScore> {
        let stick = sticks.first()?;
        Some(RawScore {
            code: stick.code.clone(),
            market: stick.market.clone(),
            stick: stick.clone(),
            stick63: sticks.get(RS_LOOKBACKS[0])?.clone(),
            stick126: sticks.get(RS_LOOKBACKS[1])?.clone(),
            stick189: sticks.get(RS_LOOKBACKS[2])?.clone(),
            stick252: sticks.get(RS_LOOKBACKS[3])?.clone(),
        })
    }

    /// Recent quarter counted twice: `2*c/c63 + c/c126 + c/c189 + c/c252`.
    pub fn score(&self) -> Decimal {
        let close = self.stick.close;
        Decimal::TWO * close_ratio(close, &self.stick63)
            + close_ratio(close, &self.stick126)
            + close_ratio(close, &self.stick189)
            + close_ratio(close, &self.stick252)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelativeStrength {
    pub code: String,
    pub market: String,
    pub stick: Candlestick,
    pub stick63: Candlestick,
    pub stick126: Candlestick,
    pub stick189: Candlestick,
    pub stick252: Candlestick,
    pub raw_score: Decimal,
    /// Percentile point, 99 for the strongest.
    pub point: i64,
}

impl Ranked for RelativeStrength {
    fn code(&self) -> &str {
        &self.code
    }

    fn market(&self) -> &str {
        &self.market
    }
}

pub struct RelativeStrengthCalculator {
    raw_scores: Vec<RawScore>,
}

impl RelativeStrengthCalculator {
    pub fn new(raw_scores: Vec<RawScore>) -> Self {
        RelativeStrengthCalculator { raw_scores }
    }

    /// Strongest first. Equal raw scores keep their input order.
    pub fn relative_strength(&self) -> Vec<RelativeStrength> {
        let mut scored: Vec<(Decimal, &RawScore)> =
            self.raw_scores.iter().map(|r| (r.score(), r)).collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let count = scored.len() as i64;
        scored
            .into_iter()
            .enumerate()
            .map(|(idx, (raw_score, raw))| RelativeStrength {
                code: raw.code.clone(),
                market: raw.market.clone(),
                stick: raw.stick.clone(),
                stick63: raw.stick63.clone(),
                stick126: raw.stick126.clone(),
                stick189: raw.stick189.clone(),
                stick252: raw.stick252.clone(),
                raw_score,
                point: 100 - (idx as i64 * 100) / count - 1,
            })
            .collect()
    }
}

/// "Faster is better": the key at position `r` of `n` weighs `1 - r/n`.
pub fn score_weights(ranking: &[String]) -> BTreeMap<String, Decimal> {
    let n = Decimal::from(ranking.len());
    ranking
        .iter()
        .enumerate()
        .map(|(r, key)| (key.clone(), Decimal::ONE - Decimal::from(r) / n))
        .collect()
}

/// Fold a new ranking into existing cache scores.
///
/// With no existing scores the ranking's weights, scaled by `coefficient`,
/// become the scores. Otherwise every existing score is scaled by
/// `coefficient` and by its weight in the ranking; keys missing from a
/// non-empty ranking drop out, and an empty ranking only applies the
/// coefficient.
pub fn blend_scores(
    existing: &BTreeMap<String, Decimal>,
    ranking: &[String],
    coefficient: Decimal,
) -> BTreeMap<String, Decimal> {
    let weights = score_weights(ranking);

    if existing.is_empty() {
        return weights
            .into_iter()
            .map(|(key, weight)| (key, weight * coefficient))
            .collect();
    }

    existing
        .iter()
        .filter_map(|(key, score)| {
            if weights.is_empty() {
                Some((key.clone(), *score * coefficient))
            } else {
                weights
                    .get(key)
                    .map(|weight| (key.clone(), *score * coefficient * *weight))
            }
        })
        .collect()
}
