pub mod inventory;
pub mod invoices;

use crate::models::{
    check_non_negative, check_positive, Discount, HOURS_LIMIT, MONEY_LIMIT, QUANTITY_LIMIT,
    TAX_RATE_LIMIT,
};
use rust_decimal::Decimal;
use validator::ValidationError;

fn rejected(code: &'static str, result: Result<(), String>) -> Result<(), ValidationError> {
    result.map_err(|msg| {
        let mut err = ValidationError::new(code);
        err.message = Some(msg.into());
        err
    })
}

fn validate_quantity(value: &Decimal) -> Result<(), ValidationError> {
    rejected("quantity", check_positive("quantity", *value, QUANTITY_LIMIT))
}

fn validate_stock(value: &Decimal) -> Result<(), ValidationError> {
    rejected("quantity", check_non_negative("quantity", *value, QUANTITY_LIMIT))
}

fn validate_price(value: &Decimal) -> Result<(), ValidationError> {
    rejected("price", check_non_negative("price", *value, MONEY_LIMIT))
}

fn validate_hours(value: &Decimal) -> Result<(), ValidationError> {
    rejected("hours", check_non_negative("hours", *value, HOURS_LIMIT))
}

fn validate_tax_rate(value: &Decimal) -> Result<(), ValidationError> {
    rejected("tax_rate", check_non_negative("tax_rate", *value, TAX_RATE_LIMIT))
}

fn validate_discount(value: &Discount) -> Result<(), ValidationError> {
    rejected("discount", value.check())
}
