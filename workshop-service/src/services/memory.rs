//! In-memory backing store.
//!
//! Each [`MemoryStore`] owns its own tables, so instances are isolated from
//! one another. A session holds the table lock for its whole lifetime and
//! works on a copy that replaces the tables on commit.

use crate::models::{
    Invoice, InvoiceFilter, InvoiceHeaderUpdate, InvoiceItem, InvoiceStatus, NewInvoiceHeader,
    NewInvoiceItem, NewPart, NewTask, Part, Payment, Task,
};
use crate::services::store::{BackingStore, StoreError, StoreSession};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
    invoices: HashMap<Uuid, Invoice>,
    items: HashMap<Uuid, Vec<InvoiceItem>>,
    payments: HashMap<Uuid, Vec<Payment>>,
    parts: HashMap<Uuid, Part>,
    tasks: HashMap<Uuid, Task>,
}

#[derive(Debug, Default)]
struct Faults {
    part_updates: HashSet<Uuid>,
    item_inserts: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<StdMutex<Faults>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every stock write to `part_id` fail until cleared.
    pub fn fail_part_updates_for(&self, part_id: Uuid) {
        self.with_faults(|f| {
            f.part_updates.insert(part_id);
        });
    }

    /// Make every item insert fail until cleared.
    pub fn fail_item_inserts(&self) {
        self.with_faults(|f| f.item_inserts = true);
    }

    pub fn clear_faults(&self) {
        self.with_faults(|f| *f = Faults::default());
    }

    /// Committed parts of `org_id`.
    pub async fn parts(&self, org_id: Uuid) -> Vec<Part> {
        let tables = self.tables.lock().await;
        tables
            .parts
            .values()
            .filter(|p| p.org_id == org_id)
            .cloned()
            .collect()
    }

    /// Committed tasks of `org_id`.
    pub async fn tasks(&self, org_id: Uuid) -> Vec<Task> {
        let tables = self.tables.lock().await;
        tables
            .tasks
            .values()
            .filter(|t| t.org_id == org_id)
            .cloned()
            .collect()
    }

    fn with_faults<R>(&self, op: impl FnOnce(&mut Faults) -> R) -> R {
        let mut faults = self.faults.lock().unwrap_or_else(PoisonError::into_inner);
        op(&mut faults)
    }
}

#[async_trait]
impl BackingStore for MemoryStore {
    async fn begin(&self, org_id: Uuid) -> Result<Box<dyn StoreSession>, StoreError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemorySession {
            guard,
            working,
            savepoints: Vec::new(),
            org_id,
            faults: self.faults.clone(),
        }))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

pub struct MemorySession {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
    savepoints: Vec<Tables>,
    org_id: Uuid,
    faults: Arc<StdMutex<Faults>>,
}

impl MemorySession {
    fn owns_invoice(&self, invoice_id: Uuid) -> bool {
        self.working
            .invoices
            .get(&invoice_id)
            .is_some_and(|inv| inv.org_id == self.org_id)
    }

    fn part_update_fails(&self, part_id: Uuid) -> bool {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .part_updates
            .contains(&part_id)
    }

    fn item_inserts_fail(&self) -> bool {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .item_inserts
    }
}

fn write_failed(msg: String) -> StoreError {
    StoreError::Write(anyhow::anyhow!(msg))
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn insert_invoice(&mut self, header: &NewInvoiceHeader) -> Result<Invoice, StoreError> {
        let now = Utc::now();
        let invoice = Invoice {
            id: Uuid::new_v4(),
            org_id: self.org_id,
            customer_id: header.customer_id,
            vehicle_id: header.vehicle_id,
            date: header.date,
            tax_rate: header.tax_rate,
            discount_type: header.discount.type_str().map(str::to_string),
            discount_value: header.discount.value(),
            status: header.status.as_str().to_string(),
            notes: header.notes.clone(),
            created_utc: now,
            updated_utc: now,
        };
        self.working.invoices.insert(invoice.id, invoice.clone());
        Ok(invoice)
    }

    async fn get_invoice(
        &mut self,
        invoice_id: Uuid,
        _lock: bool,
    ) -> Result<Option<Invoice>, StoreError> {
        Ok(self
            .working
            .invoices
            .get(&invoice_id)
            .filter(|inv| inv.org_id == self.org_id)
            .cloned())
    }

    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let status = filter
            .status
            .filter(|s| *s != InvoiceStatus::Partial)
            .map(|s| s.as_str());

        let mut invoices: Vec<Invoice> = self
            .working
            .invoices
            .values()
            .filter(|inv| inv.org_id == self.org_id)
            .filter(|inv| status.map_or(true, |s| inv.status == s))
            .filter(|inv| filter.customer_id.map_or(true, |c| inv.customer_id == c))
            .filter(|inv| filter.vehicle_id.map_or(true, |v| inv.vehicle_id == v))
            .cloned()
            .collect();

        invoices.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then_with(|| b.created_utc.cmp(&a.created_utc))
        });
        Ok(invoices)
    }

    async fn update_invoice_header(
        &mut self,
        invoice_id: Uuid,
        update: &InvoiceHeaderUpdate,
    ) -> Result<Option<Invoice>, StoreError> {
        let org_id = self.org_id;
        let Some(invoice) = self
            .working
            .invoices
            .get_mut(&invoice_id)
            .filter(|inv| inv.org_id == org_id)
        else {
            return Ok(None);
        };

        if let Some(customer_id) = update.customer_id {
            invoice.customer_id = customer_id;
        }
        if let Some(vehicle_id) = update.vehicle_id {
            invoice.vehicle_id = vehicle_id;
        }
        if let Some(date) = update.date {
            invoice.date = date;
        }
        if let Some(tax_rate) = update.tax_rate {
            invoice.tax_rate = tax_rate;
        }
        if let Some(discount) = update.discount {
            invoice.discount_type = discount.type_str().map(str::to_string);
            invoice.discount_value = discount.value();
        }
        if let Some(status) = update.status {
            invoice.status = status.as_str().to_string();
        }
        if let Some(notes) = &update.notes {
            invoice.notes = Some(notes.clone());
        }
        invoice.updated_utc = Utc::now();

        Ok(Some(invoice.clone()))
    }

    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<bool, StoreError> {
        if !self.owns_invoice(invoice_id) {
            return Ok(false);
        }
        self.working.invoices.remove(&invoice_id);
        Ok(true)
    }

    async fn list_items(&mut self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, StoreError> {
        if !self.owns_invoice(invoice_id) {
            return Ok(Vec::new());
        }
        let mut items = self
            .working
            .items
            .get(&invoice_id)
            .cloned()
            .unwrap_or_default();
        items.sort_by_key(|item| item.position);
        Ok(items)
    }

    async fn insert_items(
        &mut self,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, StoreError> {
        if self.item_inserts_fail() {
            return Err(write_failed(format!(
                "item insert rejected for invoice {}",
                invoice_id
            )));
        }
        if !self.owns_invoice(invoice_id) {
            return Err(write_failed(format!("invoice {} does not exist", invoice_id)));
        }

        let now = Utc::now();
        let inserted: Vec<InvoiceItem> = items
            .iter()
            .enumerate()
            .map(|(position, item)| InvoiceItem {
                id: Uuid::new_v4(),
                invoice_id,
                position: position as i32,
                description: item.description.clone(),
                quantity: item.quantity,
                price: item.price,
                is_auto_added: item.is_auto_added,
                line: item.line.clone(),
                created_utc: now,
            })
            .collect();

        self.working
            .items
            .entry(invoice_id)
            .or_default()
            .extend(inserted.iter().cloned());

        debug!(invoice_id = %invoice_id, count = inserted.len(), "Items inserted");
        Ok(inserted)
    }

    async fn relink_item(&mut self, item: &InvoiceItem) -> Result<(), StoreError> {
        if !self.owns_invoice(item.invoice_id) {
            return Ok(());
        }
        if let Some(stored) = self
            .working
            .items
            .get_mut(&item.invoice_id)
            .and_then(|items| items.iter_mut().find(|i| i.id == item.id))
        {
            stored.line = item.line.clone();
        }
        Ok(())
    }

    async fn delete_items(&mut self, invoice_id: Uuid) -> Result<u64, StoreError> {
        if !self.owns_invoice(invoice_id) {
            return Ok(0);
        }
        let removed = self.working.items.remove(&invoice_id).unwrap_or_default();
        Ok(removed.len() as u64)
    }

    async fn list_payments(&mut self, invoice_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        if !self.owns_invoice(invoice_id) {
            return Ok(Vec::new());
        }
        let mut payments = self
            .working
            .payments
            .get(&invoice_id)
            .cloned()
            .unwrap_or_default();
        payments.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(payments)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if !self.owns_invoice(payment.invoice_id) {
            return Err(write_failed(format!(
                "invoice {} does not exist",
                payment.invoice_id
            )));
        }
        self.working
            .payments
            .entry(payment.invoice_id)
            .or_default()
            .push(payment.clone());
        Ok(())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        if !self.owns_invoice(payment.invoice_id) {
            return Ok(());
        }
        if let Some(stored) = self
            .working
            .payments
            .get_mut(&payment.invoice_id)
            .and_then(|ps| ps.iter_mut().find(|p| p.id == payment.id))
        {
            *stored = payment.clone();
        }
        Ok(())
    }

    async fn delete_payment(
        &mut self,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), StoreError> {
        if !self.owns_invoice(invoice_id) {
            return Ok(());
        }
        if let Some(list) = self.working.payments.get_mut(&invoice_id) {
            list.retain(|p| p.id != payment_id);
        }
        Ok(())
    }

    async fn delete_payments(&mut self, invoice_id: Uuid) -> Result<u64, StoreError> {
        if !self.owns_invoice(invoice_id) {
            return Ok(0);
        }
        let removed = self.working.payments.remove(&invoice_id).unwrap_or_default();
        Ok(removed.len() as u64)
    }

    async fn get_part(&mut self, part_id: Uuid, _lock: bool) -> Result<Option<Part>, StoreError> {
        Ok(self
            .working
            .parts
            .get(&part_id)
            .filter(|p| p.org_id == self.org_id)
            .cloned())
    }

    async fn insert_part(&mut self, part: &NewPart) -> Result<Part, StoreError> {
        let part = Part {
            id: Uuid::new_v4(),
            org_id: self.org_id,
            name: part.name.clone(),
            price: part.price,
            quantity: part.quantity,
            part_number: part.part_number.clone(),
            manufacturer: part.manufacturer.clone(),
            category: part.category.clone(),
            location: part.location.clone(),
            vendor_id: part.vendor_id,
            invoice_ids: part.invoice_ids.clone(),
            created_utc: Utc::now(),
        };
        self.working.parts.insert(part.id, part.clone());
        Ok(part)
    }

    async fn update_part_stock(&mut self, part: &Part) -> Result<(), StoreError> {
        if self.part_update_fails(part.id) {
            return Err(write_failed(format!("stock update rejected for part {}", part.id)));
        }
        let org_id = self.org_id;
        if let Some(stored) = self
            .working
            .parts
            .get_mut(&part.id)
            .filter(|p| p.org_id == org_id)
        {
            stored.quantity = part.quantity;
            stored.invoice_ids = part.invoice_ids.clone();
        }
        Ok(())
    }

    async fn get_task(&mut self, task_id: Uuid, _lock: bool) -> Result<Option<Task>, StoreError> {
        Ok(self
            .working
            .tasks
            .get(&task_id)
            .filter(|t| t.org_id == self.org_id)
            .cloned())
    }

    async fn insert_task(&mut self, task: &NewTask) -> Result<Task, StoreError> {
        let task = Task {
            id: Uuid::new_v4(),
            org_id: self.org_id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str().to_string(),
            hours_estimated: task.hours_estimated,
            hours_spent: task.hours_spent,
            price: task.price,
            invoice_id: task.invoice_id,
            created_utc: Utc::now(),
        };
        self.working.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update_task_billing(&mut self, task: &Task) -> Result<(), StoreError> {
        let org_id = self.org_id;
        if let Some(stored) = self
            .working
            .tasks
            .get_mut(&task.id)
            .filter(|t| t.org_id == org_id)
        {
            stored.invoice_id = task.invoice_id;
            stored.price = task.price;
        }
        Ok(())
    }

    async fn savepoint(&mut self) -> Result<(), StoreError> {
        self.savepoints.push(self.working.clone());
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), StoreError> {
        self.savepoints
            .pop()
            .map(|_| ())
            .ok_or_else(|| write_failed("no active savepoint".to_string()))
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError> {
        let snapshot = self
            .savepoints
            .pop()
            .ok_or_else(|| write_failed("no active savepoint".to_string()))?;
        self.working = snapshot;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemorySession {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }
}
