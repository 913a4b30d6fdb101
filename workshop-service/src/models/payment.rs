//! Payment model for workshop-service.

use super::amount::MONEY_LIMIT;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_PAYMENT_METHOD: &str = "cash";

/// Payment recorded against an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub amount: Decimal,
    pub method: String,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

/// A payment as submitted by a client, before normalization.
///
/// `id` may be a real payment id, or a client-side placeholder such as
/// `temp-1` for a payment that has not been saved yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A draft after normalization. `id` is `None` for placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPayment {
    pub id: Option<Uuid>,
    pub amount: Decimal,
    pub method: String,
    pub date: DateTime<Utc>,
    pub notes: Option<String>,
}

impl NormalizedPayment {
    pub fn into_payment(self, id: Uuid, invoice_id: Uuid) -> Payment {
        Payment {
            id,
            invoice_id,
            amount: self.amount,
            method: self.method,
            date: self.date,
            notes: self.notes,
        }
    }
}

impl PaymentDraft {
    /// Convert to canonical values: a finite decimal amount, a UTC timestamp
    /// (`now` when absent), and `cash` when no method is given.
    pub fn normalize(&self, now: DateTime<Utc>) -> Result<NormalizedPayment, String> {
        if !self.amount.is_finite() {
            return Err(format!("payment amount {} is not a finite number", self.amount));
        }
        let amount = Decimal::from_f64(self.amount)
            .ok_or_else(|| format!("payment amount {} is out of range", self.amount))?
            .round_dp(2);
        MONEY_LIMIT
            .check(amount)
            .map_err(|e| format!("payment amount {}", e))?;

        let date = match self.date.as_deref().map(str::trim) {
            None | Some("") => now,
            Some(raw) => parse_payment_date(raw)
                .ok_or_else(|| format!("payment date '{}' is not a valid date", raw))?,
        };

        let method = self
            .method
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_PAYMENT_METHOD)
            .to_string();

        let id = self
            .id
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw.trim()).ok());

        Ok(NormalizedPayment {
            id,
            amount,
            method,
            date,
            notes: self.notes.clone(),
        })
    }
}

fn parse_payment_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
