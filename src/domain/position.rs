//! Open positions and closed-trade records.

use chrono::NaiveDate;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PositionType {
    Long,
    Short,
}

/// An open position owned by the simulator's per-instrument list.
#[derive(Debug, Clone, PartialEq)]
pub struct InvestCondition {
    pub position_type: PositionType,
    pub price: Decimal,
    pub volume: i64,
    pub date: NaiveDate,
    pub losscut_price: Decimal,
}

impl InvestCondition {
    pub fn is_long(&self) -> bool {
        self.position_type == PositionType::Long
    }

    pub fn is_short(&self) -> bool {
        self.position_type == PositionType::Short
    }

    /// Entry notional.
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.volume)
    }

    pub fn market_value(&self, price: Decimal) -> Decimal {
        price * Decimal::from(self.volume)
    }

    /// Close this condition at `price` on `date`.
    pub fn close(&self, price: Decimal, date: NaiveDate) -> History {
        History {
            open_date: self.date,
            close_date: date,
            open_price: self.price,
            close_price: price,
            volume: self.volume,
            position_type: self.position_type,
        }
    }
}

/// A closed trade.
#[derive(Debug, Clone, PartialEq)]
pub struct History {
    pub open_date: NaiveDate,
    pub close_date: NaiveDate,
    pub open_price: Decimal,
    pub close_price: Decimal,
    pub volume: i64,
    pub position_type: PositionType,
}

impl History {
    pub fn profit(&self) -> Decimal {
        let volume = Decimal::from(self.volume);
        match self.position_type {
            PositionType::Long => (self.close_price - self.open_price) * volume,
            PositionType::Short => (self.open_price - self.close_price) * volume,
        }
    }
}

pub fn has_long(conditions: &[InvestCondition]) -> bool {
    conditions.iter().any(InvestCondition::is_long)
}

pub fn has_short(conditions: &[InvestCondition]) -> bool {
    conditions.iter().any(InvestCondition::is_short)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 10, d).unwrap()
    }

    fn sample_long() -> InvestCondition {
        InvestCondition {
            position_type: PositionType::Long,
            price: dec!(20),
            volume: 500,
            date: date(19),
            losscut_price: dec!(18),
        }
    }

    #[test]
    fn condition_sides() {
        let long = sample_long();
        assert!(long.is_long());
        assert!(!long.is_short());

        let short = InvestCondition {
            position_type: PositionType::Short,
            ..sample_long()
        };
        assert!(short.is_short());
        assert!(has_short(&[short]));
        assert!(!has_short(&[long.clone()]));
        assert!(has_long(&[long]));
    }

    #[test]
    fn notional_and_market_value() {
        let long = sample_long();
        assert_eq!(long.notional(), dec!(10000));
        assert_eq!(long.market_value(dec!(28)), dec!(14000));
    }

    #[test]
    fn close_builds_history() {
        let history = sample_long().close(dec!(28), date(25));
        assert_eq!(history.open_date, date(19));
        assert_eq!(history.close_date, date(25));
        assert_eq!(history.open_price, dec!(20));
        assert_eq!(history.close_price, dec!(28));
        assert_eq!(history.volume, 500);
        assert_eq!(history.position_type, PositionType::Long);
    }

    #[test]
    fn long_profit() {
        let history = sample_long().close(dec!(28), date(25));
        assert_eq!(history.profit(), dec!(4000));
    }

    #[test]
    fn short_profit() {
        let short = InvestCondition {
            position_type: PositionType::Short,
            losscut_price: dec!(22),
            ..sample_long()
        };
        assert_eq!(short.close(dec!(15), date(25)).profit(), dec!(2500));
        assert_eq!(short.close(dec!(22), date(25)).profit(), dec!(-1000));
    }
}
