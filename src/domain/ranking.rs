//! Cross-sectional rankings over newest-first bar series.
//!
//! Every function takes a map of instrument code to bars, newest first, as
//! returned by a [`BarPort`](crate::ports::bar_port::BarPort). Instruments
//! without enough history are skipped with a warning rather than failing the
//! whole ranking.

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use super::analyze::{
    PerformanceData, RankingOrder, Ranked, RawScore, RelativeStrength,
    RelativeStrengthCalculator, TrendData, TrendType, blend_scores,
};
use super::candlestick::Candlestick;
use super::error::StocksimError;
use super::invest::InvestRule;
use super::statistics::Statistics;
use crate::ports::cache_port::CachePort;

pub type Bars = BTreeMap<String, Vec<Candlestick>>;

fn sort_ordered<T>(items: &mut [T], order: RankingOrder, key: impl Fn(&T) -> Decimal) {
    match order {
        RankingOrder::Asc => items.sort_by(|a, b| key(a).cmp(&key(b))),
        RankingOrder::Desc => items.sort_by(|a, b| key(b).cmp(&key(a))),
    }
}

fn non_empty<'a>(bars: &'a Bars, what: &str) -> impl Iterator<Item = (&'a String, &'a [Candlestick])> {
    let what = what.to_string();
    bars.iter().filter_map(move |(code, sticks)| {
        if sticks.is_empty() {
            tracing::warn!(%code, ranking = %what, "skipped: no bars");
            None
        } else {
            Some((code, sticks.as_slice()))
        }
    })
}

fn endpoints(sticks: &[Candlestick], value: impl Fn(&Candlestick) -> Decimal) -> Option<PerformanceData> {
    let present = sticks.first()?;
    let base = sticks.last()?;
    Some(PerformanceData {
        code: present.code.clone(),
        market: present.market.clone(),
        base_value: value(base),
        base_date: base.date,
        present_value: value(present),
        present_date: present.date,
    })
}

/// Close-price change from the oldest to the newest bar of each series.
pub fn rank_by_performance(bars: &Bars, order: RankingOrder) -> Vec<PerformanceData> {
    let mut result: Vec<PerformanceData> = non_empty(bars, "performance")
        .filter_map(|(_, sticks)| endpoints(sticks, |s| s.close))
        .collect();
    sort_ordered(&mut result, order, PerformanceData::change_rate);
    result
}

/// Volume change from the oldest to the newest bar of each series.
pub fn rank_by_volume(bars: &Bars, order: RankingOrder) -> Vec<PerformanceData> {
    let mut result: Vec<PerformanceData> = non_empty(bars, "volume")
        .filter_map(|(_, sticks)| endpoints(sticks, |s| Decimal::from(s.volume)))
        .collect();
    sort_ordered(&mut result, order, PerformanceData::change_rate);
    result
}

/// Short-term over long-term close deviation. A ratio above one means the
/// instrument has become more volatile lately.
pub fn rank_by_deviation(
    bars: &Bars,
    longterm: usize,
    shortterm: usize,
    order: RankingOrder,
) -> Vec<PerformanceData> {
    let mut result: Vec<PerformanceData> = non_empty(bars, "deviation")
        .filter_map(|(code, sticks)| {
            let long = &sticks[..longterm.min(sticks.len())];
            let short = &sticks[..shortterm.min(sticks.len())];
            let deviation =
                |window: &[Candlestick]| Statistics::new(window.iter().map(|s| s.close).collect()).standard_deviation();
            Some(PerformanceData {
                code: code.clone(),
                market: sticks[0].market.clone(),
                base_value: deviation(long),
                base_date: long.last()?.date,
                present_value: deviation(short),
                present_date: short.last()?.date,
            })
        })
        .collect();
    sort_ordered(&mut result, order, PerformanceData::rate);
    result
}

/// Relative strength over series holding at least 253 bars, ordered by raw
/// score. Points are always assigned strongest-first.
pub fn rank_by_relative_strength(bars: &Bars, order: RankingOrder) -> Vec<RelativeStrength> {
    let raw_scores: Vec<RawScore> = bars
        .iter()
        .filter_map(|(code, sticks)| {
            let raw = RawScore::from_series(sticks);
            if raw.is_none() {
                tracing::warn!(%code, bars = sticks.len(), "skipped: not enough history for relative strength");
            }
            raw
        })
        .collect();
    let mut result = RelativeStrengthCalculator::new(raw_scores).relative_strength();
    sort_ordered(&mut result, order, |r| r.raw_score);
    result
}

fn count_crossings(
    sticks: &[Candlestick],
    values: &[Decimal],
    sma_term: usize,
    margin: Decimal,
) -> TrendData {
    let offset = margin / Decimal::ONE_HUNDRED;
    let smas = Statistics::new(values.to_vec()).sma(sma_term);
    let (mut up, mut down) = (0, 0);
    for (value, sma) in values.iter().zip(&smas) {
        if *sma * (Decimal::ONE + offset) <= *value {
            up += 1;
        } else if *sma * (Decimal::ONE - offset) >= *value {
            down += 1;
        }
    }
    trend_data(sticks, up, down)
}

fn trend_data(sticks: &[Candlestick], up: usize, down: usize) -> TrendData {
    let newest = &sticks[0];
    TrendData {
        code: newest.code.clone(),
        market: newest.market.clone(),
        from_date: sticks[sticks.len() - 1].date,
        to_date: newest.date,
        up,
        down,
    }
}

fn sort_trend(mut result: Vec<TrendData>, sort: TrendType) -> Vec<TrendData> {
    result.sort_by(|a, b| b.count(sort).cmp(&a.count(sort)));
    result
}

/// Days each close sat at least `margin` percent above or below its
/// `sma_term` SMA. Feed `term + sma_term - 1` bars to count `term` days.
pub fn trend_by_price(bars: &Bars, sma_term: usize, margin: Decimal, sort: TrendType) -> Vec<TrendData> {
    let result = non_empty(bars, "trend price")
        .map(|(_, sticks)| {
            let closes: Vec<Decimal> = sticks.iter().map(|s| s.close).collect();
            count_crossings(sticks, &closes, sma_term, margin)
        })
        .collect();
    sort_trend(result, sort)
}

/// As [`trend_by_price`], over volume.
pub fn trend_by_volume(bars: &Bars, sma_term: usize, margin: Decimal, sort: TrendType) -> Vec<TrendData> {
    let result = non_empty(bars, "trend volume")
        .map(|(_, sticks)| {
            let volumes: Vec<Decimal> = sticks.iter().map(|s| Decimal::from(s.volume)).collect();
            count_crossings(sticks, &volumes, sma_term, margin)
        })
        .collect();
    sort_trend(result, sort)
}

/// Days with volume at least `margin` percent above its SMA, split by
/// whether the close rose or fell from the day before.
pub fn trend_by_momentum(bars: &Bars, sma_term: usize, margin: Decimal, sort: TrendType) -> Vec<TrendData> {
    let offset = margin / Decimal::ONE_HUNDRED;
    let result = non_empty(bars, "trend momentum")
        .map(|(_, sticks)| {
            let volumes: Vec<Decimal> = sticks.iter().map(|s| Decimal::from(s.volume)).collect();
            let changes: Vec<Decimal> = sticks.windows(2).map(|w| w[0].close - w[1].close).collect();
            let smas = Statistics::new(volumes.clone()).sma(sma_term);

            let (mut up, mut down) = (0, 0);
            for ((volume, change), sma) in volumes.iter().zip(&changes).zip(&smas) {
                if *sma * (Decimal::ONE + offset) <= *volume {
                    if change.is_sign_positive() && !change.is_zero() {
                        up += 1;
                    } else if change.is_sign_negative() && !change.is_zero() {
                        down += 1;
                    }
                }
            }
            trend_data(sticks, up, down)
        })
        .collect();
    sort_trend(result, sort)
}

/// Newest bar of every series whose newest close is the highest close in it.
pub fn all_time_highs(bars: &Bars) -> Vec<Candlestick> {
    non_empty(bars, "ath")
        .filter(|(_, sticks)| sticks.iter().map(|s| s.close).max() == Some(sticks[0].close))
        .map(|(_, sticks)| sticks[0].clone())
        .collect()
}

/// Newest bar of every series whose newest close is the lowest close in it.
pub fn all_time_lows(bars: &Bars) -> Vec<Candlestick> {
    non_empty(bars, "atl")
        .filter(|(_, sticks)| sticks.iter().map(|s| s.close).min() == Some(sticks[0].close))
        .map(|(_, sticks)| sticks[0].clone())
        .collect()
}

/// Newest bar of every series on which `rule` would open a long from flat.
/// Windows should hold `rule.required_number_of_historical_data()` bars.
pub fn scan_setup_signals(rule: &mut dyn InvestRule, windows: &Bars) -> Vec<Candlestick> {
    non_empty(windows, "signal")
        .filter(|(_, sticks)| rule.reaching_have_long(sticks, &[]))
        .map(|(_, sticks)| sticks[0].clone())
        .collect()
}

pub fn page<T>(items: &[T], offset: usize, limit: usize) -> &[T] {
    let start = offset.min(items.len());
    let end = start.saturating_add(limit).min(items.len());
    &items[start..end]
}

pub fn ranking_keys<T: Ranked>(items: &[T]) -> Vec<String> {
    items.iter().map(Ranked::cache_key).collect()
}

/// Blend `ranking` into the scores stored under `key` and write them back.
pub fn persist_ranking(
    cache: &dyn CachePort,
    key: &str,
    ranking: &[String],
    coefficient: Decimal,
) -> Result<BTreeMap<String, Decimal>, StocksimError> {
    let existing = cache.get_scores(key)?;
    let blended = blend_scores(&existing, ranking, coefficient);
    cache.clear(key)?;
    cache.set_scores(key, &blended)?;
    tracing::info!(%key, before = existing.len(), after = blended.len(), "ranking cached");
    Ok(blended)
}

/// Cached scores, highest first.
pub fn top_scores(scores: &BTreeMap<String, Decimal>) -> Vec<(String, Decimal)> {
    let mut sorted: Vec<(String, Decimal)> = scores.iter().map(|(k, v)| (k.clone(), *v)).collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted
}
