//! CLI definition and dispatch.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{Days, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::import_file;
use crate::adapters::memory_cache_adapter::MemoryCacheAdapter;
use crate::domain::analyze::{RankingOrder, Ranked, TrendType, RS_LOOKBACKS};
use crate::domain::candlestick::Candlestick;
use crate::domain::commission::Commission;
use crate::domain::config_validation::{
    parse_date, validate_cache_config, validate_commission_config, validate_data_config,
    validate_rule_params, validate_simulation_config, validate_simulation_settings,
};
use crate::domain::error::StocksimError;
use crate::domain::invest::{InvestRuleType, RuleParams, build_rule};
use crate::domain::ranking::{self, Bars};
use crate::domain::rng::{RandomSource, SeededRandom};
use crate::domain::simulator::{SimulationReport, simulate};
use crate::domain::store;
use crate::domain::universe::{self, Universe};
use crate::ports::bar_port::BarPort;
use crate::ports::cache_port::CachePort;
use crate::ports::config_port::ConfigPort;

#[derive(Parser, Debug)]
#[command(name = "stocksim", about = "Strategy simulator and stock screener")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a strategy over the configured universe
    Simulate {
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [simulation] rule
        #[arg(long)]
        rule: Option<String>,
        /// Overrides [simulation] codes
        #[arg(long)]
        codes: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Rank instruments by a single measure
    Rank {
        #[arg(value_enum)]
        kind: RankKind,
        #[arg(short, long)]
        config: PathBuf,
        /// Calendar days for performance and volume, bars for ath and atl
        #[arg(long, default_value_t = 365)]
        term: u64,
        #[arg(long, default_value_t = 200)]
        longterm: usize,
        #[arg(long, default_value_t = 20)]
        shortterm: usize,
        #[arg(long, default_value = "desc")]
        order: RankingOrder,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        /// Blend the ranking into the [cache] key
        #[arg(long)]
        cache: bool,
    },
    /// Count days spent above or below a moving-average band
    Trend {
        #[arg(value_enum)]
        kind: TrendKind,
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        term: usize,
        #[arg(long, default_value_t = 25)]
        smaterm: usize,
        /// Band half-width in percent
        #[arg(long, default_value = "0")]
        margin: Decimal,
        #[arg(long, default_value = "up")]
        sort: TrendType,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        cache: bool,
    },
    /// List instruments on which the configured rule would open a long today
    Signal {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        rule: Option<String>,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Inspect or reset cached scores
    Cache {
        #[arg(value_enum)]
        action: CacheAction,
        #[arg(short, long)]
        config: PathBuf,
        /// Overrides [cache] key
        #[arg(long)]
        key: Option<String>,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Import bars or tags into the configured data source
    Load {
        #[arg(value_enum)]
        kind: LoadKind,
        file: PathBuf,
        #[arg(short, long)]
        config: PathBuf,
        /// Refuse the whole file when a bar differs from a stored one
        #[arg(long)]
        safe: bool,
    },
    /// Rescale stored bars of one instrument for a stock split
    Split {
        code: String,
        #[arg(short, long)]
        config: PathBuf,
        /// Price before the split
        #[arg(long)]
        present: Decimal,
        /// Price after the split
        #[arg(long)]
        newer: Decimal,
        /// Newest bar to rescale, defaults to [simulation] today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Average true range of one instrument
    Atr {
        code: String,
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 14)]
        term: usize,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadKind {
    Candles,
    Tags,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RankKind {
    Performance,
    Volume,
    Deviation,
    Rs,
    Ath,
    Atl,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrendKind {
    Price,
    Volume,
    Momentum,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheAction {
    Show,
    Clear,
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(command: Command) -> Result<(), StocksimError> {
    match command {
        Command::Simulate {
            config,
            rule,
            codes,
            seed,
        } => run_simulate(&config, rule.as_deref(), codes.as_deref(), seed),
        Command::Rank {
            kind,
            config,
            term,
            longterm,
            shortterm,
            order,
            offset,
            limit,
            cache,
        } => run_rank(
            &config,
            kind,
            RankOptions {
                term,
                longterm,
                shortterm,
                order,
            },
            Paging { offset, limit },
            cache,
        ),
        Command::Trend {
            kind,
            config,
            term,
            smaterm,
            margin,
            sort,
            offset,
            limit,
            cache,
        } => run_trend(
            &config,
            kind,
            TrendOptions {
                term,
                smaterm,
                margin,
                sort,
            },
            Paging { offset, limit },
            cache,
        ),
        Command::Signal { config, rule, seed } => run_signal(&config, rule.as_deref(), seed),
        Command::Cache {
            action,
            config,
            key,
            offset,
            limit,
        } => run_cache(&config, action, key.as_deref(), Paging { offset, limit }),
        Command::Validate { config } => run_validate(&config),
        Command::Load {
            kind,
            file,
            config,
            safe,
        } => run_load(&config, kind, &file, safe),
        Command::Split {
            code,
            config,
            present,
            newer,
            date,
        } => run_split(&config, &code, present, newer, date),
        Command::Atr { code, config, term } => run_atr(&config, &code, term),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Paging {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct RankOptions {
    pub term: u64,
    pub longterm: usize,
    pub shortterm: usize,
    pub order: RankingOrder,
}

#[derive(Debug, Clone, Copy)]
pub struct TrendOptions {
    pub term: usize,
    pub smaterm: usize,
    pub margin: Decimal,
    pub sort: TrendType,
}

/// Market, instruments and reference date shared by every command.
#[derive(Debug, Clone)]
pub struct Scope {
    pub market: String,
    pub codes: Option<String>,
    pub tags: Vec<String>,
    pub today: NaiveDate,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, StocksimError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

pub fn build_scope(config: &dyn ConfigPort, codes_override: Option<&str>) -> Result<Scope, StocksimError> {
    let market = config
        .get_string("simulation", "market")
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| StocksimError::ConfigMissing {
            section: "simulation".into(),
            key: "market".into(),
        })?;
    let today = parse_date(
        "simulation",
        "today",
        config.get_string("simulation", "today").as_deref(),
    )?;
    let codes = codes_override
        .map(str::to_string)
        .or_else(|| config.get_string("simulation", "codes"));
    let tags = config
        .get_string("simulation", "tags")
        .map(|t| universe::parse_tags(&t))
        .unwrap_or_default();

    Ok(Scope {
        market: market.trim().to_string(),
        codes,
        tags,
        today,
    })
}

pub fn build_bar_port(config: &dyn ConfigPort) -> Result<Box<dyn BarPort>, StocksimError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim() {
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let adapter = crate::adapters::sqlite_adapter::SqliteAdapter::from_config(config)?;
            adapter.initialize_schema()?;
            Ok(Box::new(adapter))
        }
        "csv" => {
            let path = config
                .get_string("data", "csv_path")
                .ok_or_else(|| StocksimError::ConfigMissing {
                    section: "data".into(),
                    key: "csv_path".into(),
                })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        other => Err(StocksimError::ConfigInvalid {
            section: "data".into(),
            key: "source".into(),
            reason: format!("unsupported data source '{other}'"),
        }),
    }
}

pub fn build_cache(config: &dyn ConfigPort) -> Result<Box<dyn CachePort>, StocksimError> {
    let backend = config
        .get_string("cache", "backend")
        .unwrap_or_else(|| "memory".to_string());
    match backend.trim() {
        #[cfg(feature = "redis")]
        "redis" => Ok(Box::new(
            crate::adapters::redis_cache_adapter::RedisCacheAdapter::from_config(config)?,
        )),
        "memory" => Ok(Box::new(MemoryCacheAdapter::new())),
        other => Err(StocksimError::ConfigInvalid {
            section: "cache".into(),
            key: "backend".into(),
            reason: format!("unsupported cache backend '{other}'"),
        }),
    }
}

pub fn build_commission(config: &dyn ConfigPort) -> Commission {
    Commission::new(
        config.get_decimal("commission", "minimum", Decimal::ZERO),
        config.get_decimal("commission", "maximum", Decimal::ZERO),
        config.get_decimal("commission", "rate", Decimal::ZERO),
    )
}

fn build_rng(config: &dyn ConfigPort, seed_override: Option<u64>) -> Box<dyn RandomSource> {
    let seed = seed_override.or_else(|| {
        config
            .get_string("simulation", "seed")
            .and_then(|s| s.trim().parse().ok())
    });
    match seed {
        Some(seed) => Box::new(SeededRandom::new(seed)),
        None => Box::new(SeededRandom::from_entropy()),
    }
}

fn rule_type(config: &dyn ConfigPort, rule_override: Option<&str>) -> Result<InvestRuleType, StocksimError> {
    rule_override
        .map(str::to_string)
        .or_else(|| config.get_string("simulation", "rule"))
        .ok_or_else(|| StocksimError::ConfigMissing {
            section: "simulation".into(),
            key: "rule".into(),
        })?
        .parse()
}

fn rule_params(config: &dyn ConfigPort) -> Result<RuleParams, StocksimError> {
    validate_rule_params(config)?;
    Ok(RuleParams::new(
        positive_setting(config, "unit")?,
        config.get_decimal("simulation", "losscut_rate", Decimal::ZERO),
    ))
}

fn positive_setting(config: &dyn ConfigPort, key: &str) -> Result<usize, StocksimError> {
    let value = config.get_int("simulation", key, 0);
    usize::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| StocksimError::ConfigInvalid {
            section: "simulation".into(),
            key: key.into(),
            reason: format!("{key} must be at least 1, got {value}"),
        })
}

fn resolve(bar_port: &dyn BarPort, scope: &Scope) -> Result<Universe, StocksimError> {
    let universe = universe::resolve_universe(bar_port, &scope.market, scope.codes.as_deref(), &scope.tags)?;
    eprintln!("Universe: {} codes on {}", universe.count(), universe.market);
    Ok(universe)
}

fn windows(bar_port: &dyn BarPort, scope: &Scope, limit: usize, minimum: usize) -> Result<Bars, StocksimError> {
    let universe = resolve(bar_port, scope)?;
    let bars = universe::load_windows(bar_port, &universe, limit, scope.today)?;
    universe::retain_sufficient(bars, &scope.market, minimum)
}

fn run_simulate(
    config_path: &Path,
    rule_override: Option<&str>,
    codes_override: Option<&str>,
    seed: Option<u64>,
) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    // the override replaces [simulation] rule, so only the rest is validated
    let rule_type = rule_type(&config, rule_override)?;
    validate_simulation_settings(&config)?;
    validate_commission_config(&config)?;

    let scope = build_scope(&config, codes_override)?;
    let params = rule_params(&config)?;
    let term = positive_setting(&config, "term")?;
    let principal = config.get_decimal("simulation", "principal", Decimal::ZERO);

    let bar_port = build_bar_port(&config)?;
    let bars = windows(bar_port.as_ref(), &scope, term, 1)?;

    eprintln!(
        "Simulating {} over {} codes, {} bars up to {}",
        rule_type,
        bars.len(),
        term,
        scope.today
    );
    let mut rule = build_rule(rule_type, params, &bars, build_rng(&config, seed));
    let report = simulate(rule.as_mut(), &bars, principal, build_commission(&config));
    print_report(&report);
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("=== Simulation Results ===");
    println!("Principal:          {:.2}", report.principal);
    println!("Current Valuation:  {:.2}", report.current_valuation);
    println!("Realised Profit:    {:.2}", report.total_profit());
    println!("Closed Trades:      {}", report.trade_count());
    println!("Open Positions:     {}", report.open_position_count());
    println!("Win Rate:           {:.4}", report.win_rate);
    println!("Lose Rate:          {:.4}", report.lose_rate);
    println!("Mean Profit:        {:.2}", report.mean_profit);
    println!("Mean Loss:          {:.2}", report.mean_loss);
    println!("Payoff Ratio:       {:.4}", report.payoff_ratio);
    println!("Commission:         {:.2}", report.commission);

    for (code, histories) in &report.histories {
        if histories.is_empty() {
            continue;
        }
        let profit: Decimal = histories.iter().map(|h| h.profit()).sum();
        println!("  {}: {} trades, {:.2}", code, histories.len(), profit);
    }
}

fn print_ranked<T: Ranked>(items: &[T], paging: Paging, detail: impl Fn(&T) -> String) {
    for (i, item) in ranking::page(items, paging.offset, paging.limit).iter().enumerate() {
        println!("{:>4} {:<16} {}", paging.offset + i + 1, item.cache_key(), detail(item));
    }
}

fn print_sticks(sticks: &[Candlestick], paging: Paging) {
    for (i, stick) in ranking::page(sticks, paging.offset, paging.limit).iter().enumerate() {
        println!(
            "{:>4} {}:{:<10} {} close {}",
            paging.offset + i + 1,
            stick.market,
            stick.code,
            stick.date,
            stick.close
        );
    }
}

fn cache_ranking(config: &dyn ConfigPort, keys: &[String]) -> Result<(), StocksimError> {
    validate_cache_config(config)?;
    let cache = build_cache(config)?;
    let key = config
        .get_string("cache", "key")
        .unwrap_or_else(|| "ranking".to_string());
    let coefficient = config.get_decimal("cache", "coefficient", Decimal::ONE);
    let blended = ranking::persist_ranking(cache.as_ref(), &key, keys, coefficient)?;
    eprintln!("Cached {} scores under {}", blended.len(), key);
    Ok(())
}

fn run_rank(
    config_path: &Path,
    kind: RankKind,
    options: RankOptions,
    paging: Paging,
    cache: bool,
) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    let scope = build_scope(&config, None)?;
    let bar_port = build_bar_port(&config)?;

    let keys = match kind {
        RankKind::Performance | RankKind::Volume => {
            let from = scope
                .today
                .checked_sub_days(Days::new(options.term))
                .unwrap_or(NaiveDate::MIN);
            let universe = resolve(bar_port.as_ref(), &scope)?;
            let bars = universe::load_range(bar_port.as_ref(), &universe, from, scope.today)?;
            let ranked = if kind == RankKind::Performance {
                ranking::rank_by_performance(&bars, options.order)
            } else {
                ranking::rank_by_volume(&bars, options.order)
            };
            print_ranked(&ranked, paging, |p| {
                format!("{} -> {} ({:.4})", p.base_value, p.present_value, p.change_rate())
            });
            ranking::ranking_keys(&ranked)
        }
        RankKind::Deviation => {
            let bars = windows(bar_port.as_ref(), &scope, options.longterm, 1)?;
            let ranked =
                ranking::rank_by_deviation(&bars, options.longterm, options.shortterm, options.order);
            print_ranked(&ranked, paging, |p| {
                format!("{:.4} / {:.4} ({:.4})", p.present_value, p.base_value, p.rate())
            });
            ranking::ranking_keys(&ranked)
        }
        RankKind::Rs => {
            let needed = RS_LOOKBACKS[RS_LOOKBACKS.len() - 1] + 1;
            let bars = windows(bar_port.as_ref(), &scope, needed, needed)?;
            let ranked = ranking::rank_by_relative_strength(&bars, options.order);
            print_ranked(&ranked, paging, |r| format!("{:.4} point {}", r.raw_score, r.point));
            ranking::ranking_keys(&ranked)
        }
        RankKind::Ath | RankKind::Atl => {
            let bars = windows(bar_port.as_ref(), &scope, options.term as usize, 1)?;
            let sticks = if kind == RankKind::Ath {
                ranking::all_time_highs(&bars)
            } else {
                ranking::all_time_lows(&bars)
            };
            print_sticks(&sticks, paging);
            sticks.iter().map(|s| format!("{}:{}", s.market, s.code)).collect()
        }
    };

    if cache {
        cache_ranking(&config, &keys)?;
    }
    Ok(())
}

fn run_trend(
    config_path: &Path,
    kind: TrendKind,
    options: TrendOptions,
    paging: Paging,
    cache: bool,
) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    let scope = build_scope(&config, None)?;
    let bar_port = build_bar_port(&config)?;

    let limit = options.term + options.smaterm.saturating_sub(1);
    let bars = windows(bar_port.as_ref(), &scope, limit, 1)?;
    let trend = match kind {
        TrendKind::Price => ranking::trend_by_price(&bars, options.smaterm, options.margin, options.sort),
        TrendKind::Volume => ranking::trend_by_volume(&bars, options.smaterm, options.margin, options.sort),
        TrendKind::Momentum => {
            ranking::trend_by_momentum(&bars, options.smaterm, options.margin, options.sort)
        }
    };
    print_ranked(&trend, paging, |t| {
        format!("up {} down {} ({} - {})", t.up, t.down, t.from_date, t.to_date)
    });

    if cache {
        cache_ranking(&config, &ranking::ranking_keys(&trend))?;
    }
    Ok(())
}

fn run_signal(config_path: &Path, rule_override: Option<&str>, seed: Option<u64>) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    let scope = build_scope(&config, None)?;
    let rule_type = rule_type(&config, rule_override)?;
    let params = rule_params(&config)?;
    let bar_port = build_bar_port(&config)?;

    let required = build_rule(rule_type, params.clone(), &BTreeMap::new(), build_rng(&config, seed))
        .required_number_of_historical_data();
    let bars = windows(bar_port.as_ref(), &scope, required, required)?;

    let mut rule = build_rule(rule_type, params, &bars, build_rng(&config, seed));
    let signals = ranking::scan_setup_signals(rule.as_mut(), &bars);
    eprintln!("{} of {} codes signal {} on {}", signals.len(), bars.len(), rule_type, scope.today);
    print_sticks(
        &signals,
        Paging {
            offset: 0,
            limit: signals.len(),
        },
    );
    Ok(())
}

fn run_cache(
    config_path: &Path,
    action: CacheAction,
    key_override: Option<&str>,
    paging: Paging,
) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_cache_config(&config)?;
    let cache = build_cache(&config)?;
    let key = key_override
        .map(str::to_string)
        .or_else(|| config.get_string("cache", "key"))
        .unwrap_or_else(|| "ranking".to_string());

    match action {
        CacheAction::Show => {
            let scores = ranking::top_scores(&cache.get_scores(&key)?);
            for (i, (member, score)) in ranking::page(&scores, paging.offset, paging.limit)
                .iter()
                .enumerate()
            {
                println!("{:>4} {:<16} {:.6}", paging.offset + i + 1, member, score);
            }
        }
        CacheAction::Clear => {
            cache.clear(&key)?;
            eprintln!("Cleared {}", key);
        }
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    validate_simulation_config(&config)?;
    validate_commission_config(&config)?;
    validate_cache_config(&config)?;
    println!("Configuration is valid.");
    Ok(())
}

fn run_load(config_path: &Path, kind: LoadKind, file: &Path, safe: bool) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    let bar_port = build_bar_port(&config)?;

    match kind {
        LoadKind::Candles => {
            let sticks = import_file::read_bar_file(file)?;
            let saved = store::import_sticks(bar_port.as_ref(), &sticks, safe)?;
            println!("Loaded {} bars from {}", saved, file.display());
        }
        LoadKind::Tags => {
            let entries = import_file::read_tag_file(file)?;
            let saved = store::import_tags(bar_port.as_ref(), &entries)?;
            println!("Tagged {} instruments from {}", saved, file.display());
        }
    }
    Ok(())
}

fn run_split(
    config_path: &Path,
    code: &str,
    present: Decimal,
    newer: Decimal,
    date: Option<NaiveDate>,
) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    let scope = build_scope(&config, None)?;
    let bar_port = build_bar_port(&config)?;

    let code = code.trim().to_uppercase();
    let target = date.unwrap_or(scope.today);
    let rewritten = store::apply_split(bar_port.as_ref(), &code, &scope.market, present, newer, target)?;
    println!(
        "Rescaled {} bars of {}:{} up to {} by {}/{}",
        rewritten, scope.market, code, target, newer, present
    );
    Ok(())
}

fn run_atr(config_path: &Path, code: &str, term: usize) -> Result<(), StocksimError> {
    let config = load_config(config_path)?;
    validate_data_config(&config)?;
    let scope = build_scope(&config, None)?;
    let bar_port = build_bar_port(&config)?;

    let code = code.trim().to_uppercase();
    let atr = store::average_atr(bar_port.as_ref(), &code, &scope.market, term, scope.today)?;
    println!("{}:{} ATR({}) on {}: {:.4}", scope.market, code, term, scope.today, atr);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(content: &str) -> FileConfigAdapter {
        FileConfigAdapter::from_string(content).unwrap()
    }

    #[test]
    fn parses_simulate_command() {
        let cli = Cli::try_parse_from(["stocksim", "simulate", "-c", "sim.ini", "--rule", "turtle", "--seed", "7"])
            .unwrap();
        match cli.command {
            Command::Simulate { config, rule, seed, .. } => {
                assert_eq!(config, PathBuf::from("sim.ini"));
                assert_eq!(rule.as_deref(), Some("turtle"));
                assert_eq!(seed, Some(7));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_rank_with_order_and_paging() {
        let cli = Cli::try_parse_from([
            "stocksim", "rank", "rs", "-c", "x.ini", "--order", "asc", "--offset", "5", "--limit", "3", "--cache",
        ])
        .unwrap();
        match cli.command {
            Command::Rank {
                kind,
                order,
                offset,
                limit,
                cache,
                ..
            } => {
                assert_eq!(kind, RankKind::Rs);
                assert_eq!(order, RankingOrder::Asc);
                assert_eq!((offset, limit), (5, 3));
                assert!(cache);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_trend_margin_as_decimal() {
        let cli = Cli::try_parse_from(["stocksim", "trend", "momentum", "-c", "x.ini", "--margin", "2.5", "--sort", "down"])
            .unwrap();
        match cli.command {
            Command::Trend { kind, margin, sort, .. } => {
                assert_eq!(kind, TrendKind::Momentum);
                assert_eq!(margin, dec!(2.5));
                assert_eq!(sort, TrendType::Down);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_split_prices_and_date() {
        let cli = Cli::try_parse_from([
            "stocksim", "split", "ibm", "-c", "x.ini", "--present", "200", "--newer", "50", "--date", "2024-06-03",
        ])
        .unwrap();
        match cli.command {
            Command::Split {
                code,
                present,
                newer,
                date,
                ..
            } => {
                assert_eq!(code, "ibm");
                assert_eq!((present, newer), (dec!(200), dec!(50)));
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 6, 3));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parses_load_kind_and_safe_flag() {
        let cli = Cli::try_parse_from(["stocksim", "load", "candles", "bars.csv", "-c", "x.ini", "--safe"]).unwrap();
        match cli.command {
            Command::Load { kind, file, safe, .. } => {
                assert_eq!(kind, LoadKind::Candles);
                assert_eq!(file, PathBuf::from("bars.csv"));
                assert!(safe);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(Cli::try_parse_from(["stocksim", "load", "quotes", "q.csv", "-c", "x.ini"]).is_err());
    }

    #[test]
    fn rejects_unknown_rank_kind() {
        assert!(Cli::try_parse_from(["stocksim", "rank", "beta", "-c", "x.ini"]).is_err());
    }

    #[test]
    fn scope_reads_market_tags_and_date() {
        let cfg = config("[simulation]\nmarket = NYSE\ntoday = 2024-03-01\ntags = tech, energy\n");
        let scope = build_scope(&cfg, Some("IBM")).unwrap();
        assert_eq!(scope.market, "NYSE");
        assert_eq!(scope.tags, vec!["tech", "energy"]);
        assert_eq!(scope.codes.as_deref(), Some("IBM"));
        assert_eq!(scope.today, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn scope_requires_market() {
        let err = build_scope(&config("[simulation]\ntoday = 2024-03-01\n"), None).unwrap_err();
        assert!(matches!(err, StocksimError::ConfigMissing { key, .. } if key == "market"));
    }

    #[test]
    fn commission_from_config() {
        let cfg = config("[commission]\nminimum = 1\nmaximum = 20\nrate = 0.001\n");
        assert_eq!(build_commission(&cfg).amount(dec!(100000)), dec!(20));
        assert_eq!(build_commission(&cfg).amount(dec!(100)), dec!(1));
    }

    #[test]
    fn unknown_rule_override_is_rejected() {
        let err = rule_type(&config("[simulation]\nrule = turtle\n"), Some("martingale")).unwrap_err();
        assert!(matches!(err, StocksimError::UnknownRule { .. }));
    }

    #[test]
    fn rule_params_reject_non_positive_unit() {
        for unit in ["0", "-3"] {
            let err = rule_params(&config(&format!("[simulation]\nunit = {unit}\n"))).unwrap_err();
            assert!(matches!(err, StocksimError::ConfigInvalid { key, .. } if key == "unit"));
        }
        let params = rule_params(&config("[simulation]\nunit = 4\nlosscut_rate = 0.2\n")).unwrap();
        assert_eq!(params.unit_number, 4);
    }

    #[test]
    fn term_is_not_clamped() {
        let err = positive_setting(&config("[simulation]\nterm = -1\n"), "term").unwrap_err();
        assert!(matches!(err, StocksimError::ConfigInvalid { key, .. } if key == "term"));
        assert_eq!(positive_setting(&config("[simulation]\nterm = 30\n"), "term").unwrap(), 30);
    }

    #[test]
    fn memory_cache_is_default_backend() {
        let cache = build_cache(&config("[cache]\n")).unwrap();
        assert!(cache.get_scores("anything").unwrap().is_empty());
    }
}
