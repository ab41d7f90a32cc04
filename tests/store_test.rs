//! Bar maintenance through a bar port: imports, split adjustment and ATR.

mod common;

use common::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stocksim::domain::candlestick::Candlestick;
use stocksim::domain::error::StocksimError;
use stocksim::domain::store::{self, InstrumentTags};
use stocksim::ports::bar_port::BarPort;

fn start() -> chrono::NaiveDate {
    date(2023, 1, 1)
}

fn port() -> MockBarPort {
    MockBarPort::new().with_sticks("UP", generate_sticks("UP", start(), 10, dec!(100), dec!(1)))
}

fn stored(port: &MockBarPort, day: u32) -> Candlestick {
    port.get("UP", MARKET, date(2023, 1, day), date(2023, 1, day)).unwrap().remove(0)
}

mod import {
    use super::*;

    fn incoming() -> Vec<Candlestick> {
        vec![
            make_stick("UP", date(2023, 1, 11), dec!(110), 1000),
            make_stick("UP", date(2023, 1, 5), dec!(999), 1000),
        ]
    }

    #[test]
    fn safe_mode_saves_nothing_on_conflict() {
        let port = port();
        let err = store::import_sticks(&port, &incoming(), true).unwrap_err();

        assert!(matches!(err, StocksimError::Inconsistent { count: 1 }));
        assert_eq!(port.data.borrow()["UP"].len(), 10);
        assert_eq!(stored(&port, 5).close, dec!(104));
    }

    #[test]
    fn conflicts_pair_present_and_newer() {
        let conflicts = store::find_conflicts(&port(), &incoming()).unwrap();
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].present.close, dec!(104));
        assert_eq!(conflicts[0].newer.close, dec!(999));
    }

    #[test]
    fn unsafe_mode_overwrites() {
        let port = port();
        assert_eq!(store::import_sticks(&port, &incoming(), false).unwrap(), 2);
        assert_eq!(port.data.borrow()["UP"].len(), 11);
        assert_eq!(stored(&port, 5).close, dec!(999));
    }

    #[test]
    fn identical_bars_are_not_conflicts() {
        let port = port();
        let again = port.data.borrow()["UP"].clone();
        assert_eq!(store::import_sticks(&port, &again, true).unwrap(), 10);
    }

    #[test]
    fn tags_replace_per_instrument() {
        let port = port().with_tags("UP", &["old"]);
        let entries = vec![InstrumentTags {
            code: "UP".into(),
            market: MARKET.into(),
            tags: vec!["growth".into()],
        }];
        assert_eq!(store::import_tags(&port, &entries).unwrap(), 1);
        assert_eq!(port.list_codes(MARKET, &["growth".to_string()]).unwrap(), vec!["UP"]);
        assert!(port.list_codes(MARKET, &["old".to_string()]).unwrap().is_empty());
    }
}

mod split {
    use super::*;

    #[test]
    fn rescales_history_up_to_the_target_date() {
        let port = port();
        let rewritten = store::apply_split(&port, "UP", MARKET, dec!(2), dec!(1), date(2023, 1, 5)).unwrap();
        assert_eq!(rewritten, 5);

        let halved = stored(&port, 5);
        assert_eq!(halved.close, dec!(52));
        assert_eq!(halved.high, dec!(52.5));
        assert_eq!(halved.volume, 2000);
        assert!(halved.patched);

        let untouched = stored(&port, 6);
        assert_eq!(untouched.close, dec!(105));
        assert!(!untouched.patched);
    }

    #[test]
    fn rejects_non_positive_prices() {
        let err = store::apply_split(&port(), "UP", MARKET, Decimal::ZERO, dec!(1), date(2023, 1, 5)).unwrap_err();
        assert!(matches!(err, StocksimError::InvalidArgument { .. }));
    }

    #[test]
    fn unknown_code_has_no_data() {
        let err = store::apply_split(&port(), "ZZZ", MARKET, dec!(2), dec!(1), date(2023, 1, 5)).unwrap_err();
        assert!(matches!(err, StocksimError::NoData { code, .. } if code == "ZZZ"));
    }
}

mod atr {
    use super::*;

    #[test]
    fn ramp_has_constant_true_range() {
        let atr = store::average_atr(&port(), "UP", MARKET, 5, date(2023, 1, 10)).unwrap();
        assert_eq!(atr, dec!(2));
    }

    #[test]
    fn needs_a_full_term() {
        let err = store::average_atr(&port(), "UP", MARKET, 5, date(2023, 1, 3)).unwrap_err();
        assert!(matches!(err, StocksimError::NoData { .. }));
    }

    #[test]
    fn zero_term_is_invalid() {
        let err = store::average_atr(&port(), "UP", MARKET, 0, date(2023, 1, 10)).unwrap_err();
        assert!(matches!(err, StocksimError::InvalidArgument { name, .. } if name == "term"));
    }
}
