use super::{validate_discount, validate_price, validate_quantity, validate_tax_rate};
use crate::models::{
    CustomLaborData, CustomPartData, Discount, InvoiceDetail, InvoiceFilter, InvoiceHeaderUpdate,
    InvoiceItem, InvoiceStatus, InvoiceTotals, InvoiceUpdate, ItemLine, NewInvoice,
    NewInvoiceHeader, NewInvoiceItem, Payment, PaymentDraft,
};
use crate::services::{ItemOutcome, Reconciled, SideEffect};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

// -----------------------------------------------------------------------------
// Requests
// -----------------------------------------------------------------------------

/// Line item in the flat shape clients send.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InvoiceItemRequest {
    #[validate(length(min = 1, message = "Item description cannot be empty"))]
    pub description: String,
    pub kind: String,
    #[validate(custom(function = "validate_quantity"))]
    pub quantity: Decimal,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
    pub part_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub is_auto_added: bool,
    #[serde(default)]
    pub creates_inventory_part: bool,
    #[serde(default)]
    pub creates_task: bool,
    pub custom_part_data: Option<CustomPartData>,
    pub custom_labor_data: Option<CustomLaborData>,
}

impl TryFrom<InvoiceItemRequest> for NewInvoiceItem {
    type Error = AppError;

    fn try_from(req: InvoiceItemRequest) -> Result<Self, Self::Error> {
        let line = ItemLine::from_flat(
            &req.kind,
            req.part_id,
            req.task_id,
            req.creates_inventory_part,
            req.creates_task,
            req.custom_part_data,
            req.custom_labor_data,
        )
        .map_err(|e| {
            AppError::BadRequest(anyhow::anyhow!("Invalid item '{}': {}", req.description, e))
        })?;

        Ok(NewInvoiceItem {
            description: req.description,
            quantity: req.quantity,
            price: req.price,
            is_auto_added: req.is_auto_added,
            line,
        })
    }
}

fn convert_items(items: Vec<InvoiceItemRequest>) -> Result<Vec<NewInvoiceItem>, AppError> {
    items.into_iter().map(NewInvoiceItem::try_from).collect()
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub date: NaiveDate,
    #[validate(custom(function = "validate_tax_rate"))]
    #[serde(default)]
    pub tax_rate: Decimal,
    #[validate(custom(function = "validate_discount"))]
    #[serde(default)]
    pub discount: Discount,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
    #[validate(nested)]
    #[serde(default)]
    pub items: Vec<InvoiceItemRequest>,
}

impl TryFrom<CreateInvoiceRequest> for NewInvoice {
    type Error = AppError;

    fn try_from(req: CreateInvoiceRequest) -> Result<Self, Self::Error> {
        Ok(NewInvoice {
            header: NewInvoiceHeader {
                customer_id: req.customer_id,
                vehicle_id: req.vehicle_id,
                date: req.date,
                tax_rate: req.tax_rate,
                discount: req.discount,
                status: req.status.unwrap_or(InvoiceStatus::Open),
                notes: req.notes,
            },
            items: convert_items(req.items)?,
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub date: Option<NaiveDate>,
    #[validate(custom(function = "validate_tax_rate"))]
    pub tax_rate: Option<Decimal>,
    #[validate(custom(function = "validate_discount"))]
    pub discount: Option<Discount>,
    pub status: Option<InvoiceStatus>,
    pub notes: Option<String>,
    #[validate(nested)]
    pub items: Option<Vec<InvoiceItemRequest>>,
    pub payments: Option<Vec<PaymentDraft>>,
}

impl TryFrom<UpdateInvoiceRequest> for InvoiceUpdate {
    type Error = AppError;

    fn try_from(req: UpdateInvoiceRequest) -> Result<Self, Self::Error> {
        Ok(InvoiceUpdate {
            header: InvoiceHeaderUpdate {
                customer_id: req.customer_id,
                vehicle_id: req.vehicle_id,
                date: req.date,
                tax_rate: req.tax_rate,
                discount: req.discount,
                status: req.status,
                notes: req.notes,
            },
            items: req.items.map(convert_items).transpose()?,
            payments: req.payments,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InvoiceListParams {
    pub status: Option<InvoiceStatus>,
    pub customer_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
}

impl From<InvoiceListParams> for InvoiceFilter {
    fn from(params: InvoiceListParams) -> Self {
        Self {
            status: params.status,
            customer_id: params.customer_id,
            vehicle_id: params.vehicle_id,
        }
    }
}

// -----------------------------------------------------------------------------
// Responses
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct InvoiceItemResponse {
    pub id: Uuid,
    pub description: String,
    pub kind: &'static str,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total: Decimal,
    pub part_id: Option<Uuid>,
    pub task_id: Option<Uuid>,
    pub is_auto_added: bool,
    pub creates_inventory_part: bool,
    pub creates_task: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_part_data: Option<CustomPartData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_labor_data: Option<CustomLaborData>,
}

impl From<InvoiceItem> for InvoiceItemResponse {
    fn from(item: InvoiceItem) -> Self {
        let total = item.line_total().unwrap_or_default();
        let flat = item.line.to_flat();
        Self {
            id: item.id,
            description: item.description,
            kind: flat.kind,
            quantity: item.quantity,
            price: item.price,
            total,
            part_id: flat.part_id,
            task_id: flat.task_id,
            is_auto_added: item.is_auto_added,
            creates_inventory_part: flat.creates_inventory_part,
            creates_task: flat.creates_task,
            custom_part_data: flat.custom_part_data,
            custom_labor_data: flat.custom_labor_data,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub date: NaiveDate,
    pub tax_rate: Decimal,
    pub discount: Discount,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub items: Vec<InvoiceItemResponse>,
    pub payments: Vec<Payment>,
    pub totals: InvoiceTotals,
    pub created_at: String,
    pub updated_at: String,
}

impl From<InvoiceDetail> for InvoiceResponse {
    fn from(detail: InvoiceDetail) -> Self {
        let InvoiceDetail {
            invoice,
            items,
            payments,
            totals,
        } = detail;
        Self {
            id: invoice.id,
            customer_id: invoice.customer_id,
            vehicle_id: invoice.vehicle_id,
            date: invoice.date,
            tax_rate: invoice.tax_rate,
            discount: invoice.discount(),
            status: invoice.status(),
            notes: invoice.notes,
            items: items.into_iter().map(InvoiceItemResponse::from).collect(),
            payments,
            totals,
            created_at: invoice.created_utc.to_rfc3339(),
            updated_at: invoice.updated_utc.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SideEffectStatus {
    Ok,
    Failed,
}

#[derive(Debug, Serialize)]
pub struct SideEffectResponse {
    pub item_id: Uuid,
    pub description: String,
    pub status: SideEffectStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effect: Option<SideEffect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ItemOutcome> for SideEffectResponse {
    fn from(outcome: ItemOutcome) -> Self {
        let (status, effect, error) = match outcome.outcome {
            Ok(effect) => (SideEffectStatus::Ok, Some(effect), None),
            Err(e) => (SideEffectStatus::Failed, None, Some(e)),
        };
        Self {
            item_id: outcome.item_id,
            description: outcome.description,
            status,
            effect,
            error,
        }
    }
}

/// Invoice plus the per-item side effects of the write that produced it.
#[derive(Debug, Serialize)]
pub struct ReconciledResponse {
    #[serde(flatten)]
    pub invoice: InvoiceResponse,
    pub side_effects: Vec<SideEffectResponse>,
}

impl From<Reconciled> for ReconciledResponse {
    fn from(reconciled: Reconciled) -> Self {
        Self {
            invoice: reconciled.invoice.into(),
            side_effects: reconciled
                .outcomes
                .into_iter()
                .map(SideEffectResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub total: usize,
}
