//! Bounds for stored decimal amounts.
//!
//! Each limit mirrors a `NUMERIC(precision, scale)` column, so a value that
//! passes here is stored as given by every backend.

use rust_decimal::Decimal;

/// Largest magnitude and number of decimal places a column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountLimit {
    pub max: Decimal,
    pub scale: u32,
}

/// Item and part quantities, `NUMERIC(12, 3)`.
pub const QUANTITY_LIMIT: AmountLimit = AmountLimit {
    // 999_999_999.999
    max: Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 3),
    scale: 3,
};

/// Prices, fixed discounts and payment amounts, `NUMERIC(12, 2)`.
pub const MONEY_LIMIT: AmountLimit = AmountLimit {
    // 9_999_999_999.99
    max: Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2),
    scale: 2,
};

/// Task hours, `NUMERIC(8, 2)`.
pub const HOURS_LIMIT: AmountLimit = AmountLimit {
    // 999_999.99
    max: Decimal::from_parts(99_999_999, 0, 0, false, 2),
    scale: 2,
};

/// Tax rates in percent.
pub const TAX_RATE_LIMIT: AmountLimit = AmountLimit {
    max: Decimal::ONE_HUNDRED,
    scale: 4,
};

/// Percentage discounts.
pub const PERCENT_LIMIT: AmountLimit = AmountLimit {
    max: Decimal::ONE_HUNDRED,
    scale: 2,
};

impl AmountLimit {
    /// Reject values too large or too precise for the column.
    pub fn check(&self, value: Decimal) -> Result<(), String> {
        if value.abs() > self.max {
            return Err(format!("{} exceeds the maximum of {}", value, self.max));
        }
        if value.normalize().scale() > self.scale {
            return Err(format!(
                "{} has more than {} decimal places",
                value, self.scale
            ));
        }
        Ok(())
    }
}

/// `value` must be greater than zero and fit `limit`.
pub fn check_positive(field: &str, value: Decimal, limit: AmountLimit) -> Result<(), String> {
    if value <= Decimal::ZERO {
        return Err(format!("{} must be greater than zero, got {}", field, value));
    }
    limit.check(value).map_err(|e| format!("{}: {}", field, e))
}

/// `value` must not be negative and must fit `limit`.
pub fn check_non_negative(field: &str, value: Decimal, limit: AmountLimit) -> Result<(), String> {
    if value < Decimal::ZERO {
        return Err(format!("{} cannot be negative, got {}", field, value));
    }
    limit.check(value).map_err(|e| format!("{}: {}", field, e))
}
