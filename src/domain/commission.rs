//! Transaction cost model.

use rust_decimal::Decimal;

/// Fee proportional to notional, clamped to `[minimum, maximum]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Commission {
    pub minimum: Decimal,
    pub maximum: Decimal,
    pub rate: Decimal,
}

impl Commission {
    pub fn new(minimum: Decimal, maximum: Decimal, rate: Decimal) -> Self {
        Commission {
            minimum,
            maximum,
            rate,
        }
    }

    /// A commission that always charges nothing.
    pub fn free() -> Self {
        Commission::new(Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
    }

    pub fn amount(&self, notional: Decimal) -> Decimal {
        (self.rate * notional).max(self.minimum).min(self.maximum)
    }
}
