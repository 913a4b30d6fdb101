//! Invoice model for workshop-service.

use super::amount::{check_non_negative, MONEY_LIMIT, PERCENT_LIMIT, TAX_RATE_LIMIT};
use super::item::{InvoiceItem, NewInvoiceItem};
use super::payment::{Payment, PaymentDraft};
use super::totals::{InvoiceTotals, TotalsOverflow};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
///
/// `Partial` is never written by the workshop UI; it is only used as a
/// list filter for invoices that are part-paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InvoiceStatus {
    Open,
    InProgress,
    Completed,
    Paid,
    Partial,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Open => "open",
            InvoiceStatus::InProgress => "in-progress",
            InvoiceStatus::Completed => "completed",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Partial => "partial",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "in-progress" => InvoiceStatus::InProgress,
            "completed" => InvoiceStatus::Completed,
            "paid" => InvoiceStatus::Paid,
            "partial" => InvoiceStatus::Partial,
            _ => InvoiceStatus::Open,
        }
    }
}

/// Discount applied to the invoice subtotal before tax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    #[default]
    None,
    /// Percent of the subtotal, e.g. `10` for 10%. At most 100.
    Percentage(Decimal),
    /// Flat amount, capped at the subtotal.
    Fixed(Decimal),
}

impl Discount {
    /// Column value for `discount_type`.
    pub fn type_str(&self) -> Option<&'static str> {
        match self {
            Discount::None => None,
            Discount::Percentage(_) => Some("percentage"),
            Discount::Fixed(_) => Some("fixed"),
        }
    }

    /// Column value for `discount_value`.
    pub fn value(&self) -> Decimal {
        match self {
            Discount::None => Decimal::ZERO,
            Discount::Percentage(v) | Discount::Fixed(v) => *v,
        }
    }

    /// Percentages run from 0 to 100; fixed amounts are non-negative money.
    pub fn check(&self) -> Result<(), String> {
        match self {
            Discount::None => Ok(()),
            Discount::Percentage(pct) => check_non_negative("discount", *pct, PERCENT_LIMIT),
            Discount::Fixed(amount) => check_non_negative("discount", *amount, MONEY_LIMIT),
        }
    }

    pub fn from_parts(discount_type: Option<&str>, value: Decimal) -> Self {
        match discount_type {
            Some("percentage") => Discount::Percentage(value),
            Some("fixed") => Discount::Fixed(value),
            _ => Discount::None,
        }
    }
}

/// Invoice header as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub org_id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub date: NaiveDate,
    pub tax_rate: Decimal,
    pub discount_type: Option<String>,
    pub discount_value: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

impl Invoice {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_string(&self.status)
    }

    pub fn discount(&self) -> Discount {
        Discount::from_parts(self.discount_type.as_deref(), self.discount_value)
    }
}

/// Header fields for a new invoice.
#[derive(Debug, Clone)]
pub struct NewInvoiceHeader {
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub date: NaiveDate,
    pub tax_rate: Decimal,
    pub discount: Discount,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
}

fn check_rates(tax_rate: Option<Decimal>, discount: Option<&Discount>) -> Result<(), String> {
    if let Some(tax_rate) = tax_rate {
        check_non_negative("tax_rate", tax_rate, TAX_RATE_LIMIT)?;
    }
    discount.map_or(Ok(()), Discount::check)
}

impl NewInvoiceHeader {
    pub fn check_amounts(&self) -> Result<(), String> {
        check_rates(Some(self.tax_rate), Some(&self.discount))
    }
}

/// Input for creating an invoice together with its items.
#[derive(Debug, Clone)]
pub struct NewInvoice {
    pub header: NewInvoiceHeader,
    pub items: Vec<NewInvoiceItem>,
}

/// Header fields to change; `None` leaves the stored value alone.
#[derive(Debug, Clone, Default)]
pub struct InvoiceHeaderUpdate {
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    pub tax_rate: Option<Decimal>,
    pub discount: Option<Discount>,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
}

impl InvoiceHeaderUpdate {
    pub fn is_empty(&self) -> bool {
        self.customer_id.is_none()
            && self.vehicle_id.is_none()
            && self.date.is_none()
            && self.tax_rate.is_none()
            && self.discount.is_none()
            && self.status.is_none()
            && self.notes.is_none()
    }

    pub fn check_amounts(&self) -> Result<(), String> {
        check_rates(self.tax_rate, self.discount.as_ref())
    }
}

/// Input for updating an invoice.
///
/// `items` and `payments` each replace the stored collection wholesale when
/// present.
#[derive(Debug, Clone, Default)]
pub struct InvoiceUpdate {
    pub header: InvoiceHeaderUpdate,
    pub items: Option<Vec<NewInvoiceItem>>,
    pub payments: Option<Vec<PaymentDraft>>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
}

/// An invoice with its items, payments and computed totals.
#[derive(Debug, Clone)]
pub struct InvoiceDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
    pub totals: InvoiceTotals,
}

impl InvoiceDetail {
    pub fn new(
        invoice: Invoice,
        items: Vec<InvoiceItem>,
        payments: Vec<Payment>,
    ) -> Result<Self, TotalsOverflow> {
        let totals = InvoiceTotals::compute(
            &items,
            &payments,
            invoice.tax_rate,
            invoice.discount(),
        )?;
        Ok(Self {
            invoice,
            items,
            payments,
            totals,
        })
    }

    /// Part-paid: something received, balance still outstanding.
    pub fn is_partially_paid(&self) -> bool {
        self.totals.amount_paid > Decimal::ZERO && self.totals.balance_due > Decimal::ZERO
    }
}
