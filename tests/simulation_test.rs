//! Simulation pipeline tests: universe resolution through a bar port, rule
//! construction and multi-instrument simulation.

mod common;

use common::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use stocksim::domain::candlestick::Candlestick;
use stocksim::domain::commission::Commission;
use stocksim::domain::error::StocksimError;
use stocksim::domain::invest::{InvestRuleType, RuleParams, TurtleRule, build_rule, trail_stops};
use stocksim::domain::position::{InvestCondition, PositionType};
use stocksim::domain::rng::{ScriptedRandom, SeededRandom};
use stocksim::domain::simulator::{InvestSimulator, simulate};
use stocksim::domain::universe;

const BARS: usize = 200;
const WINDOW: usize = 150;

fn port() -> MockBarPort {
    let start = date(2023, 1, 1);
    MockBarPort::new()
        .with_sticks("UP", generate_sticks("UP", start, BARS, dec!(100), dec!(1)))
        .with_sticks("DOWN", generate_sticks("DOWN", start, BARS, dec!(400), dec!(-1)))
        .with_sticks("WAVE", generate_wave("WAVE", start, BARS, dec!(100), dec!(30), 24))
        .with_tags("UP", &["momentum"])
        .with_tags("WAVE", &["momentum", "cyclical"])
}

fn today() -> chrono::NaiveDate {
    date(2023, 1, 1) + chrono::Duration::days(BARS as i64 - 1)
}

fn load(port: &MockBarPort, tags: &[String]) -> BTreeMap<String, Vec<Candlestick>> {
    let universe = universe::resolve_universe(port, MARKET, None, tags).unwrap();
    universe::load_windows(port, &universe, WINDOW, today()).unwrap()
}

mod pipeline {
    use super::*;

    #[test]
    fn windows_are_newest_first_and_bounded() {
        let bars = load(&port(), &[]);
        assert_eq!(bars.len(), 3);
        for sticks in bars.values() {
            assert_eq!(sticks.len(), WINDOW);
            assert_eq!(sticks[0].date, today());
            assert!(sticks.windows(2).all(|w| w[0].date > w[1].date));
        }
    }

    #[test]
    fn tags_narrow_the_universe() {
        let bars = load(&port(), &["cyclical".to_string()]);
        assert_eq!(bars.keys().collect::<Vec<_>>(), vec!["WAVE"]);
    }

    #[test]
    fn explicit_codes_override_tags() {
        let port = port();
        let universe =
            universe::resolve_universe(&port, MARKET, Some("down"), &["momentum".to_string()]).unwrap();
        assert_eq!(universe.codes, vec!["DOWN"]);
    }

    #[test]
    fn port_errors_propagate() {
        let port = port().with_error("UP", "disk on fire");
        let universe = universe::resolve_universe(&port, MARKET, None, &[]).unwrap();
        let err = universe::load_windows(&port, &universe, WINDOW, today()).unwrap_err();
        assert!(matches!(err, StocksimError::Database { reason } if reason == "disk on fire"));
    }

    #[test]
    fn load_range_skips_instruments_without_bars() {
        let port = port().with_sticks("LATE", generate_sticks("LATE", date(2030, 1, 1), 5, dec!(1), dec!(1)));
        let universe = universe::resolve_universe(&port, MARKET, None, &[]).unwrap();
        let bars = universe::load_range(&port, &universe, date(2023, 1, 1), today()).unwrap();
        assert!(!bars.contains_key("LATE"));
        assert_eq!(bars["UP"].len(), BARS);
    }
}

mod accounting {
    use super::*;

    fn open_notional(conditions: &BTreeMap<String, Vec<InvestCondition>>) -> Decimal {
        conditions
            .values()
            .flatten()
            .map(|c| match c.position_type {
                PositionType::Long => c.notional(),
                PositionType::Short => -c.notional(),
            })
            .sum()
    }

    #[test]
    fn cash_and_open_positions_reconcile_for_every_rule() {
        let bars = load(&port(), &[]);
        let principal = dec!(1000000);

        for rule_type in InvestRuleType::ALL {
            for seed in [1u64, 7, 42] {
                let params = RuleParams::new(3, dec!(0.05));
                let mut rule = build_rule(rule_type, params, &bars, Box::new(SeededRandom::new(seed)));
                let mut simulator =
                    InvestSimulator::new(rule.as_mut(), &bars, principal, Commission::free());
                simulator.simulate();

                let realised: Decimal = simulator
                    .histories()
                    .values()
                    .flatten()
                    .map(|h| h.profit())
                    .sum();
                assert_eq!(
                    simulator.cash() + open_notional(simulator.conditions()),
                    principal + realised,
                    "{rule_type} seed {seed}"
                );
            }
        }
    }

    #[test]
    fn same_seed_reproduces_the_report() {
        let bars = load(&port(), &[]);
        for rule_type in InvestRuleType::ALL {
            let run = || {
                let mut rule = build_rule(
                    rule_type,
                    RuleParams::new(2, dec!(0.1)),
                    &bars,
                    Box::new(SeededRandom::new(99)),
                );
                simulate(rule.as_mut(), &bars, dec!(500000), Commission::free())
            };
            assert_eq!(run(), run(), "{rule_type}");
        }
    }

    #[test]
    fn turtle_rides_trends_on_both_sides() {
        let bars: BTreeMap<String, Vec<Candlestick>> = load(&port(), &[])
            .into_iter()
            .filter(|(code, _)| code != "WAVE")
            .collect();
        let mut rule = TurtleRule::new(RuleParams::new(3, dec!(0.1)), Box::new(ScriptedRandom::constant(0.0)));
        let report = simulate(&mut rule, &bars, dec!(1000000), Commission::free());

        assert!(report.positions["UP"].iter().all(InvestCondition::is_long));
        assert_eq!(report.positions["UP"].len(), 1);
        assert!(report.positions["DOWN"].iter().all(InvestCondition::is_short));
        assert_eq!(report.positions["DOWN"].len(), 1);
        assert!(report.current_valuation > report.principal);
    }

    #[test]
    fn commission_is_reported_not_deducted() {
        let bars = load(&port(), &[]);
        let run = |commission: Commission| {
            let mut rule =
                TurtleRule::new(RuleParams::new(3, dec!(0.1)), Box::new(ScriptedRandom::constant(0.0)));
            simulate(&mut rule, &bars, dec!(1000000), commission)
        };
        let free = run(Commission::free());
        let charged = run(Commission::new(dec!(1), dec!(50), dec!(0.001)));

        assert_eq!(free.current_valuation, charged.current_valuation);
        assert_eq!(free.commission, Decimal::ZERO);
        assert!(charged.commission > Decimal::ZERO);
    }
}

mod trailing {
    use super::*;

    fn condition(position_type: PositionType, stop: Decimal) -> InvestCondition {
        InvestCondition {
            position_type,
            price: dec!(100),
            volume: 10,
            date: date(2023, 1, 1),
            losscut_price: stop,
        }
    }

    fn bar(low: i64, spread: i64) -> Candlestick {
        let low = Decimal::from(low);
        let high = low + Decimal::from(spread);
        Candlestick::new("X", MARKET, date(2023, 1, 2), low, high, low, low, 1)
    }

    proptest! {
        #[test]
        fn long_stops_never_fall(
            lows in prop::collection::vec(1i64..10_000, 1..60),
            spread in 0i64..100,
            rate in 0i64..50,
        ) {
            let params = RuleParams::new(1, Decimal::new(rate, 2));
            let mut conditions = vec![condition(PositionType::Long, dec!(90))];
            let mut last = conditions[0].losscut_price;
            for low in lows {
                trail_stops(PositionType::Long, &params, &[bar(low, spread)], &mut conditions);
                prop_assert!(conditions[0].losscut_price >= last);
                last = conditions[0].losscut_price;
            }
        }

        #[test]
        fn short_stops_never_rise(
            lows in prop::collection::vec(1i64..10_000, 1..60),
            spread in 0i64..100,
            rate in 0i64..50,
        ) {
            let params = RuleParams::new(1, Decimal::new(rate, 2));
            let mut conditions = vec![condition(PositionType::Short, dec!(110))];
            let mut last = conditions[0].losscut_price;
            for low in lows {
                trail_stops(PositionType::Short, &params, &[bar(low, spread)], &mut conditions);
                prop_assert!(conditions[0].losscut_price <= last);
                last = conditions[0].losscut_price;
            }
        }

        #[test]
        fn trailing_one_side_leaves_the_other(
            low in 1i64..10_000,
            rate in 0i64..50,
        ) {
            let params = RuleParams::new(1, Decimal::new(rate, 2));
            let mut conditions = vec![
                condition(PositionType::Long, dec!(1)),
                condition(PositionType::Short, dec!(1000000)),
            ];
            trail_stops(PositionType::Long, &params, &[bar(low, 5)], &mut conditions);
            prop_assert_eq!(conditions[1].losscut_price, dec!(1000000));
        }
    }
}
