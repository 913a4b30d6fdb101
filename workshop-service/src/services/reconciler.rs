//! Invoice reconciliation.
//!
//! Keeps invoice items, part stock, task billing and payments consistent
//! across invoice create, update and remove. Each operation runs in one
//! store session; every item's side effect runs inside its own savepoint so
//! a failing item is rolled back on its own and the rest carry on.

use crate::models::{
    Invoice, InvoiceDetail, InvoiceFilter, InvoiceItem, InvoiceStatus, InvoiceUpdate, ItemLine,
    LaborLine, NewInvoice, NewInvoiceItem, NewPart, NewTask, NormalizedPayment, Part, PartLine,
    PaymentDraft, Task,
};
use crate::services::metrics::{ERRORS_TOTAL, INVOICE_OPERATIONS_TOTAL, SIDE_EFFECTS_TOTAL};
use crate::services::store::{BackingStore, StoreError, StoreSession};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use service_core::error::AppError;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    StoreWrite(#[from] StoreError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),
}

impl ReconcileError {
    fn kind(&self) -> &'static str {
        match self {
            ReconcileError::StoreWrite(_) => "store",
            ReconcileError::Validation(_) => "validation",
            ReconcileError::NotFound(_) => "not_found",
        }
    }
}

impl From<ReconcileError> for AppError {
    fn from(err: ReconcileError) -> Self {
        match err {
            ReconcileError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ReconcileError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            ReconcileError::StoreWrite(e) => AppError::DatabaseError(anyhow::Error::new(e)),
        }
    }
}

/// What an item's side effect did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SideEffect {
    None,
    StockConsumed {
        part_id: Uuid,
        quantity_after: Decimal,
    },
    TaskLinked {
        task_id: Uuid,
    },
    PartCreated {
        part_id: Uuid,
    },
    TaskCreated {
        task_id: Uuid,
    },
}

/// Side effect result for one invoice item.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub item_id: Uuid,
    pub description: String,
    pub outcome: Result<SideEffect, String>,
}

/// An invoice after create or update, with what happened to each item.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub invoice: InvoiceDetail,
    pub outcomes: Vec<ItemOutcome>,
}

impl Reconciled {
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes.iter().filter(|o| o.outcome.is_err())
    }
}

#[derive(Debug, Error)]
enum SideEffectError {
    #[error("part {0} not found")]
    MissingPart(Uuid),

    #[error("task {0} not found")]
    MissingTask(Uuid),

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn effect_label(line: &ItemLine) -> &'static str {
    match line {
        ItemLine::Part(PartLine::Stock { .. }) => "consume_stock",
        ItemLine::Part(PartLine::Custom(_)) | ItemLine::Other { custom_part: Some(_) } => {
            "create_part"
        }
        ItemLine::Labor(LaborLine::Task { .. }) => "link_task",
        ItemLine::Labor(LaborLine::Custom(_)) => "create_task",
        ItemLine::Labor(LaborLine::Unlinked) | ItemLine::Other { custom_part: None } => "none",
    }
}

fn validation<E: ToString>(err: E) -> ReconcileError {
    ReconcileError::Validation(err.to_string())
}

fn check_items(items: &[NewInvoiceItem]) -> Result<(), ReconcileError> {
    items
        .iter()
        .try_for_each(NewInvoiceItem::check_amounts)
        .map_err(ReconcileError::Validation)
}

fn normalize_payments(drafts: &[PaymentDraft]) -> Result<Vec<NormalizedPayment>, ReconcileError> {
    let now = Utc::now();
    drafts
        .iter()
        .map(|d| d.normalize(now))
        .collect::<Result<Vec<_>, _>>()
        .map_err(ReconcileError::Validation)
}

fn record<T>(operation: &str, result: &Result<T, ReconcileError>) {
    match result {
        Ok(_) => INVOICE_OPERATIONS_TOTAL
            .with_label_values(&[operation, "ok"])
            .inc(),
        Err(e) => {
            INVOICE_OPERATIONS_TOTAL
                .with_label_values(&[operation, "error"])
                .inc();
            ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
        }
    }
}

#[derive(Clone)]
pub struct InvoiceReconciler {
    store: Arc<dyn BackingStore>,
}

impl InvoiceReconciler {
    pub fn new(store: Arc<dyn BackingStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BackingStore> {
        &self.store
    }

    // -------------------------------------------------------------------------
    // Invoice writes
    // -------------------------------------------------------------------------

    /// Create an invoice with its items and apply each item's side effect.
    #[instrument(skip(self, input), fields(org_id = %org_id, items = input.items.len()))]
    pub async fn create_invoice(
        &self,
        org_id: Uuid,
        input: NewInvoice,
    ) -> Result<Reconciled, ReconcileError> {
        let result = self.create_inner(org_id, input).await;
        record("create", &result);
        result
    }

    async fn create_inner(
        &self,
        org_id: Uuid,
        input: NewInvoice,
    ) -> Result<Reconciled, ReconcileError> {
        input.header.check_amounts().map_err(validation)?;
        check_items(&input.items)?;

        let mut session = self.store.begin(org_id).await?;
        let invoice = session.insert_invoice(&input.header).await?;

        let items = if input.items.is_empty() {
            Vec::new()
        } else {
            session.insert_items(invoice.id, &input.items).await?
        };
        let outcomes = apply_side_effects(session.as_mut(), invoice.id, items).await?;

        let detail = load_detail(session.as_mut(), invoice).await?;
        session.commit().await?;

        info!(
            invoice_id = %detail.invoice.id,
            total = %detail.totals.total,
            failed_items = outcomes.iter().filter(|o| o.outcome.is_err()).count(),
            "Invoice created"
        );

        Ok(Reconciled {
            invoice: detail,
            outcomes,
        })
    }

    /// Update an invoice. Items and payments, when present, replace the
    /// stored collections.
    #[instrument(skip(self, update), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
        update: InvoiceUpdate,
    ) -> Result<Reconciled, ReconcileError> {
        let result = self.update_inner(org_id, invoice_id, update).await;
        record("update", &result);
        result
    }

    async fn update_inner(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
        update: InvoiceUpdate,
    ) -> Result<Reconciled, ReconcileError> {
        update.header.check_amounts().map_err(validation)?;
        if let Some(items) = &update.items {
            check_items(items)?;
        }
        let payments = update
            .payments
            .as_deref()
            .map(normalize_payments)
            .transpose()?;

        let mut session = self.store.begin(org_id).await?;
        let mut invoice = session
            .get_invoice(invoice_id, true)
            .await?
            .ok_or_else(|| invoice_not_found(invoice_id))?;

        if update.items.is_some() {
            let existing = session.list_items(invoice_id).await?;
            restore_stock(session.as_mut(), invoice_id, &existing).await?;
        }

        if !update.header.is_empty() {
            invoice = session
                .update_invoice_header(invoice_id, &update.header)
                .await?
                .ok_or_else(|| invoice_not_found(invoice_id))?;
        }

        let mut outcomes = Vec::new();
        if let Some(items) = &update.items {
            let removed = session.delete_items(invoice_id).await?;
            let inserted = if items.is_empty() {
                Vec::new()
            } else {
                session.insert_items(invoice_id, items).await?
            };
            debug!(removed = removed, inserted = inserted.len(), "Invoice items replaced");
            outcomes = apply_side_effects(session.as_mut(), invoice_id, inserted).await?;
        }

        if let Some(payments) = payments {
            reconcile_payments(session.as_mut(), invoice_id, payments).await?;
        }

        let detail = load_detail(session.as_mut(), invoice).await?;
        session.commit().await?;

        info!(
            total = %detail.totals.total,
            balance_due = %detail.totals.balance_due,
            failed_items = outcomes.iter().filter(|o| o.outcome.is_err()).count(),
            "Invoice updated"
        );

        Ok(Reconciled {
            invoice: detail,
            outcomes,
        })
    }

    /// Delete an invoice with its payments and items. Part stock and task
    /// links are left as they are.
    #[instrument(skip(self), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn remove_invoice(&self, org_id: Uuid, invoice_id: Uuid) -> Result<(), ReconcileError> {
        let result = self.remove_inner(org_id, invoice_id).await;
        record("remove", &result);
        result
    }

    async fn remove_inner(&self, org_id: Uuid, invoice_id: Uuid) -> Result<(), ReconcileError> {
        let mut session = self.store.begin(org_id).await?;
        session
            .get_invoice(invoice_id, true)
            .await?
            .ok_or_else(|| invoice_not_found(invoice_id))?;

        let payments = session.delete_payments(invoice_id).await?;
        let items = session.delete_items(invoice_id).await?;
        session.delete_invoice(invoice_id).await?;
        session.commit().await?;

        info!(payments = payments, items = items, "Invoice removed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice reads
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<InvoiceDetail, ReconcileError> {
        let mut session = self.store.begin(org_id).await?;
        let invoice = session
            .get_invoice(invoice_id, false)
            .await?
            .ok_or_else(|| invoice_not_found(invoice_id))?;
        load_detail(session.as_mut(), invoice).await
    }

    /// List invoices matching `filter`. A `partial` status filter keeps
    /// invoices that are part-paid.
    #[instrument(skip(self, filter), fields(org_id = %org_id))]
    pub async fn list_invoices(
        &self,
        org_id: Uuid,
        filter: &InvoiceFilter,
    ) -> Result<Vec<InvoiceDetail>, ReconcileError> {
        let mut session = self.store.begin(org_id).await?;
        let invoices = session.list_invoices(filter).await?;

        let mut details = Vec::with_capacity(invoices.len());
        for invoice in invoices {
            details.push(load_detail(session.as_mut(), invoice).await?);
        }

        if filter.status == Some(InvoiceStatus::Partial) {
            details.retain(InvoiceDetail::is_partially_paid);
        }
        Ok(details)
    }

    // -------------------------------------------------------------------------
    // Parts and tasks
    // -------------------------------------------------------------------------

    #[instrument(skip(self, part), fields(org_id = %org_id, name = %part.name))]
    pub async fn create_part(&self, org_id: Uuid, part: NewPart) -> Result<Part, ReconcileError> {
        part.check_amounts().map_err(validation)?;
        let mut session = self.store.begin(org_id).await?;
        let part = session.insert_part(&part).await?;
        session.commit().await?;
        info!(part_id = %part.id, "Part created");
        Ok(part)
    }

    #[instrument(skip(self), fields(org_id = %org_id, part_id = %part_id))]
    pub async fn get_part(&self, org_id: Uuid, part_id: Uuid) -> Result<Part, ReconcileError> {
        let mut session = self.store.begin(org_id).await?;
        session
            .get_part(part_id, false)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("Part {} not found", part_id)))
    }

    #[instrument(skip(self, task), fields(org_id = %org_id, title = %task.title))]
    pub async fn create_task(&self, org_id: Uuid, task: NewTask) -> Result<Task, ReconcileError> {
        task.check_amounts().map_err(validation)?;
        let mut session = self.store.begin(org_id).await?;
        let task = session.insert_task(&task).await?;
        session.commit().await?;
        info!(task_id = %task.id, "Task created");
        Ok(task)
    }

    #[instrument(skip(self), fields(org_id = %org_id, task_id = %task_id))]
    pub async fn get_task(&self, org_id: Uuid, task_id: Uuid) -> Result<Task, ReconcileError> {
        let mut session = self.store.begin(org_id).await?;
        session
            .get_task(task_id, false)
            .await?
            .ok_or_else(|| ReconcileError::NotFound(format!("Task {} not found", task_id)))
    }
}

fn invoice_not_found(invoice_id: Uuid) -> ReconcileError {
    ReconcileError::NotFound(format!("Invoice {} not found", invoice_id))
}

async fn load_detail(
    session: &mut dyn StoreSession,
    invoice: Invoice,
) -> Result<InvoiceDetail, ReconcileError> {
    let items = session.list_items(invoice.id).await?;
    let payments = session.list_payments(invoice.id).await?;
    let invoice_id = invoice.id;
    InvoiceDetail::new(invoice, items, payments)
        .map_err(|e| ReconcileError::Validation(format!("invoice {}: {}", invoice_id, e)))
}

/// Put back the stock consumed by the invoice's current part items.
async fn restore_stock(
    session: &mut dyn StoreSession,
    invoice_id: Uuid,
    items: &[InvoiceItem],
) -> Result<(), StoreError> {
    for item in items {
        let Some(part_id) = item.line.stock_part_id() else {
            continue;
        };
        let Some(mut part) = session.get_part(part_id, true).await? else {
            warn!(part_id = %part_id, item_id = %item.id, "Part to restore no longer exists");
            continue;
        };
        part.restock(item.quantity);
        part.detach_invoice(invoice_id);
        session.update_part_stock(&part).await?;
        debug!(part_id = %part_id, quantity = %part.quantity, "Stock restored");
    }
    Ok(())
}

async fn apply_side_effects(
    session: &mut dyn StoreSession,
    invoice_id: Uuid,
    items: Vec<InvoiceItem>,
) -> Result<Vec<ItemOutcome>, StoreError> {
    let mut outcomes = Vec::with_capacity(items.len());

    for mut item in items {
        let label = effect_label(&item.line);

        session.savepoint().await?;
        let outcome = match apply_item(session, invoice_id, &mut item).await {
            Ok(effect) => {
                session.release_savepoint().await?;
                SIDE_EFFECTS_TOTAL.with_label_values(&[label, "ok"]).inc();
                Ok(effect)
            }
            Err(e) => {
                session.rollback_to_savepoint().await?;
                SIDE_EFFECTS_TOTAL.with_label_values(&[label, "failed"]).inc();
                warn!(
                    invoice_id = %invoice_id,
                    item_id = %item.id,
                    effect = label,
                    error = %e,
                    "Item side effect failed"
                );
                Err(e.to_string())
            }
        };

        outcomes.push(ItemOutcome {
            item_id: item.id,
            description: item.description,
            outcome,
        });
    }

    Ok(outcomes)
}

/// Apply one item's side effect. Items that created a record are relinked
/// to it so later updates treat it as an existing part or task.
async fn apply_item(
    session: &mut dyn StoreSession,
    invoice_id: Uuid,
    item: &mut InvoiceItem,
) -> Result<SideEffect, SideEffectError> {
    match item.line.clone() {
        ItemLine::Part(PartLine::Custom(data)) => {
            let part = session
                .insert_part(&NewPart::consumed_by_invoice(&data, item.price, invoice_id))
                .await?;
            item.line = ItemLine::Part(PartLine::Stock { part_id: part.id });
            session.relink_item(item).await?;
            Ok(SideEffect::PartCreated { part_id: part.id })
        }
        ItemLine::Other {
            custom_part: Some(data),
        } => {
            let part = session
                .insert_part(&NewPart::consumed_by_invoice(&data, item.price, invoice_id))
                .await?;
            item.line = ItemLine::Other { custom_part: None };
            session.relink_item(item).await?;
            Ok(SideEffect::PartCreated { part_id: part.id })
        }
        ItemLine::Labor(LaborLine::Custom(data)) => {
            let new_task =
                NewTask::billed_on_invoice(&data, item.quantity, item.price, invoice_id);
            new_task.check_amounts().map_err(SideEffectError::Rejected)?;
            let task = session.insert_task(&new_task).await?;
            item.line = ItemLine::Labor(LaborLine::Task { task_id: task.id });
            session.relink_item(item).await?;
            Ok(SideEffect::TaskCreated { task_id: task.id })
        }
        ItemLine::Part(PartLine::Stock { part_id }) => {
            let mut part = session
                .get_part(part_id, true)
                .await?
                .ok_or(SideEffectError::MissingPart(part_id))?;
            part.consume(item.quantity);
            part.attach_invoice(invoice_id);
            session.update_part_stock(&part).await?;
            Ok(SideEffect::StockConsumed {
                part_id,
                quantity_after: part.quantity,
            })
        }
        ItemLine::Labor(LaborLine::Task { task_id }) => {
            let mut task = session
                .get_task(task_id, true)
                .await?
                .ok_or(SideEffectError::MissingTask(task_id))?;
            task.invoice_id = Some(invoice_id);
            task.price = item.price;
            session.update_task_billing(&task).await?;
            Ok(SideEffect::TaskLinked { task_id })
        }
        ItemLine::Labor(LaborLine::Unlinked) | ItemLine::Other { custom_part: None } => {
            Ok(SideEffect::None)
        }
    }
}

/// Make the invoice's payments match `incoming`, by id. Only ids already on
/// this invoice are kept; any other id is treated as a placeholder.
async fn reconcile_payments(
    session: &mut dyn StoreSession,
    invoice_id: Uuid,
    incoming: Vec<NormalizedPayment>,
) -> Result<(), StoreError> {
    let existing: HashSet<Uuid> = session
        .list_payments(invoice_id)
        .await?
        .into_iter()
        .map(|p| p.id)
        .collect();

    let mut seen = HashSet::new();
    let mut updates = Vec::new();
    let mut inserts = Vec::new();
    for payment in incoming {
        match payment.id {
            Some(id) if existing.contains(&id) && seen.insert(id) => {
                updates.push(payment.into_payment(id, invoice_id));
            }
            _ => inserts.push(payment.into_payment(Uuid::new_v4(), invoice_id)),
        }
    }

    let stale: Vec<Uuid> = existing.difference(&seen).copied().collect();
    for id in &stale {
        session.delete_payment(invoice_id, *id).await?;
    }
    for payment in &updates {
        session.update_payment(payment).await?;
    }
    for payment in &inserts {
        session.insert_payment(payment).await?;
    }

    debug!(
        deleted = stale.len(),
        updated = updates.len(),
        inserted = inserts.len(),
        "Payments reconciled"
    );
    Ok(())
}
