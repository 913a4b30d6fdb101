//! Invoice total calculation.

use super::invoice::Discount;
use super::item::InvoiceItem;
use super::payment::Payment;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invoice totals exceed the representable range")]
pub struct TotalsOverflow;

/// Money summary of an invoice, rounded to cents. Computed on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub balance_due: Decimal,
}

impl InvoiceTotals {
    /// The discount never exceeds the subtotal, whatever its kind.
    pub fn compute(
        items: &[InvoiceItem],
        payments: &[Payment],
        tax_rate: Decimal,
        discount: Discount,
    ) -> Result<Self, TotalsOverflow> {
        let subtotal = items.iter().try_fold(Decimal::ZERO, |acc, item| {
            item.line_total().and_then(|line| acc.checked_add(line))
        });
        let subtotal = subtotal.ok_or(TotalsOverflow)?;

        let discount = match discount {
            Discount::None => Decimal::ZERO,
            Discount::Percentage(pct) => {
                subtotal.checked_mul(pct).ok_or(TotalsOverflow)? / HUNDRED
            }
            Discount::Fixed(amount) => amount,
        }
        .clamp(Decimal::ZERO, subtotal.max(Decimal::ZERO));

        let taxable = subtotal - discount;
        let tax = taxable.checked_mul(tax_rate).ok_or(TotalsOverflow)? / HUNDRED;
        let total = taxable.checked_add(tax).ok_or(TotalsOverflow)?;
        let amount_paid = payments
            .iter()
            .try_fold(Decimal::ZERO, |acc, p| acc.checked_add(p.amount))
            .ok_or(TotalsOverflow)?;
        let balance_due = total.checked_sub(amount_paid).ok_or(TotalsOverflow)?;

        Ok(Self {
            subtotal: subtotal.round_dp(2),
            discount: discount.round_dp(2),
            tax: tax.round_dp(2),
            total: total.round_dp(2),
            amount_paid: amount_paid.round_dp(2),
            balance_due: balance_due.round_dp(2),
        })
    }
}
