//! Inventory part model for workshop-service.

use super::amount::{check_non_negative, MONEY_LIMIT, QUANTITY_LIMIT};
use super::item::CustomPartData;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Inventory part. `invoice_ids` lists the invoices currently consuming it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Part {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub part_number: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub invoice_ids: Vec<Uuid>,
    pub created_utc: DateTime<Utc>,
}

impl Part {
    /// Take `amount` out of stock; stock never goes below zero.
    pub fn consume(&mut self, amount: Decimal) {
        self.quantity = self.quantity.saturating_sub(amount).max(Decimal::ZERO);
    }

    /// Put `amount` back into stock.
    pub fn restock(&mut self, amount: Decimal) {
        self.quantity = self.quantity.saturating_add(amount);
    }

    /// Record that `invoice_id` consumes this part. Returns false if it already did.
    pub fn attach_invoice(&mut self, invoice_id: Uuid) -> bool {
        if self.invoice_ids.contains(&invoice_id) {
            return false;
        }
        self.invoice_ids.push(invoice_id);
        true
    }

    pub fn detach_invoice(&mut self, invoice_id: Uuid) {
        self.invoice_ids.retain(|id| *id != invoice_id);
    }
}

/// Input for creating a part.
#[derive(Debug, Clone)]
pub struct NewPart {
    pub name: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub part_number: Option<String>,
    pub manufacturer: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub vendor_id: Option<Uuid>,
    pub invoice_ids: Vec<Uuid>,
}

impl NewPart {
    pub fn check_amounts(&self) -> Result<(), String> {
        check_non_negative("quantity", self.quantity, QUANTITY_LIMIT)
            .and_then(|_| check_non_negative("price", self.price, MONEY_LIMIT))
            .map_err(|e| format!("part '{}': {}", self.name, e))
    }

    /// A part created by an invoice line: zero stock, already consumed by
    /// that invoice.
    pub fn consumed_by_invoice(data: &CustomPartData, price: Decimal, invoice_id: Uuid) -> Self {
        Self {
            name: data.name.clone(),
            price,
            quantity: Decimal::ZERO,
            part_number: data.part_number.clone(),
            manufacturer: data.manufacturer.clone(),
            category: data.category.clone(),
            location: data.location.clone(),
            vendor_id: data.vendor_id,
            invoice_ids: vec![invoice_id],
        }
    }
}
