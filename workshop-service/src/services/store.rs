//! Backing store abstraction.
//!
//! All reads and writes go through a [`StoreSession`], an atomic unit of work
//! scoped to one organization. A session becomes visible to other sessions on
//! [`StoreSession::commit`]; dropping it uncommitted discards its writes.

use crate::models::{
    Invoice, InvoiceFilter, InvoiceHeaderUpdate, InvoiceItem, NewInvoiceHeader, NewInvoiceItem,
    NewPart, NewTask, Part, Payment, Task,
};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store read failed: {0}")]
    Read(anyhow::Error),

    #[error("store write failed: {0}")]
    Write(anyhow::Error),

    #[error("stored record is malformed: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Open a session for `org_id`.
    async fn begin(&self, org_id: Uuid) -> Result<Box<dyn StoreSession>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait StoreSession: Send {
    // Invoices

    async fn insert_invoice(&mut self, header: &NewInvoiceHeader) -> Result<Invoice, StoreError>;

    /// Fetch an invoice. With `lock`, other sessions updating it wait until
    /// this one ends.
    async fn get_invoice(&mut self, invoice_id: Uuid, lock: bool)
        -> Result<Option<Invoice>, StoreError>;

    /// List invoices, newest first. `InvoiceStatus::Partial` in the filter is
    /// ignored here; it is derived from payments by the caller.
    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError>;

    async fn update_invoice_header(
        &mut self,
        invoice_id: Uuid,
        update: &InvoiceHeaderUpdate,
    ) -> Result<Option<Invoice>, StoreError>;

    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<bool, StoreError>;

    // Invoice items

    /// Items of an invoice in position order.
    async fn list_items(&mut self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, StoreError>;

    /// Insert items verbatim, numbering positions from zero.
    async fn insert_items(
        &mut self,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, StoreError>;

    /// Replace an item's linkage, e.g. after its custom part was created.
    async fn relink_item(&mut self, item: &InvoiceItem) -> Result<(), StoreError>;

    async fn delete_items(&mut self, invoice_id: Uuid) -> Result<u64, StoreError>;

    // Payments

    /// Payments of an invoice, oldest first.
    async fn list_payments(&mut self, invoice_id: Uuid) -> Result<Vec<Payment>, StoreError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;

    /// Overwrite a payment of `payment.invoice_id`. Payments of other
    /// invoices are never touched.
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError>;

    async fn delete_payment(
        &mut self,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), StoreError>;

    async fn delete_payments(&mut self, invoice_id: Uuid) -> Result<u64, StoreError>;

    // Parts

    async fn get_part(&mut self, part_id: Uuid, lock: bool) -> Result<Option<Part>, StoreError>;

    async fn insert_part(&mut self, part: &NewPart) -> Result<Part, StoreError>;

    /// Write back a part's `quantity` and `invoice_ids`.
    async fn update_part_stock(&mut self, part: &Part) -> Result<(), StoreError>;

    // Tasks

    async fn get_task(&mut self, task_id: Uuid, lock: bool) -> Result<Option<Task>, StoreError>;

    async fn insert_task(&mut self, task: &NewTask) -> Result<Task, StoreError>;

    /// Write back a task's `invoice_id` and `price`.
    async fn update_task_billing(&mut self, task: &Task) -> Result<(), StoreError>;

    // Atomicity

    /// Mark a point that [`StoreSession::rollback_to_savepoint`] can return to.
    async fn savepoint(&mut self) -> Result<(), StoreError>;

    async fn release_savepoint(&mut self) -> Result<(), StoreError>;

    /// Undo everything written since the last savepoint and discard it.
    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
