//! PostgreSQL backing store for workshop-service.

use crate::models::{
    Invoice, InvoiceFilter, InvoiceHeaderUpdate, InvoiceItem, InvoiceItemRow, InvoiceStatus,
    NewInvoiceHeader, NewInvoiceItem, NewPart, NewTask, Part, Payment, Task,
};
use crate::services::metrics::STORE_QUERY_DURATION;
use crate::services::store::{BackingStore, StoreError, StoreSession};
use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{debug, info, instrument};
use uuid::Uuid;

const SAVEPOINT: &str = "item_effect";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "workshop-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl BackingStore for Database {
    #[instrument(skip(self), fields(org_id = %org_id))]
    async fn begin(&self, org_id: Uuid) -> Result<Box<dyn StoreSession>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Read(anyhow::anyhow!("Failed to begin transaction: {}", e)))?;
        Ok(Box::new(PgSession { tx, org_id }))
    }

    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Read(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }
}

/// One transaction, scoped to an organization.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
    org_id: Uuid,
}

fn read_err(what: &str, e: sqlx::Error) -> StoreError {
    StoreError::Read(anyhow::anyhow!("Failed to {}: {}", what, e))
}

fn write_err(what: &str, e: sqlx::Error) -> StoreError {
    StoreError::Write(anyhow::anyhow!("Failed to {}: {}", what, e))
}

fn into_item(row: InvoiceItemRow) -> Result<InvoiceItem, StoreError> {
    let item_id = row.id;
    InvoiceItem::try_from(row)
        .map_err(|e| StoreError::Corrupt(format!("invoice item {}: {}", item_id, e)))
}

#[async_trait]
impl StoreSession for PgSession {
    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self, header), fields(org_id = %self.org_id))]
    async fn insert_invoice(&mut self, header: &NewInvoiceHeader) -> Result<Invoice, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["insert_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            INSERT INTO invoices (
                id, org_id, customer_id, vehicle_id, date, tax_rate,
                discount_type, discount_value, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, org_id, customer_id, vehicle_id, date, tax_rate,
                discount_type, discount_value, status, notes, created_utc, updated_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.org_id)
        .bind(header.customer_id)
        .bind(header.vehicle_id)
        .bind(header.date)
        .bind(header.tax_rate)
        .bind(header.discount.type_str())
        .bind(header.discount.value())
        .bind(header.status.as_str())
        .bind(&header.notes)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| write_err("create invoice", e))?;

        timer.observe_duration();

        debug!(invoice_id = %invoice.id, "Invoice header inserted");

        Ok(invoice)
    }

    #[instrument(skip(self), fields(org_id = %self.org_id, invoice_id = %invoice_id))]
    async fn get_invoice(
        &mut self,
        invoice_id: Uuid,
        lock: bool,
    ) -> Result<Option<Invoice>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let sql = if lock {
            r#"
            SELECT id, org_id, customer_id, vehicle_id, date, tax_rate,
                discount_type, discount_value, status, notes, created_utc, updated_utc
            FROM invoices
            WHERE org_id = $1 AND id = $2
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, org_id, customer_id, vehicle_id, date, tax_rate,
                discount_type, discount_value, status, notes, created_utc, updated_utc
            FROM invoices
            WHERE org_id = $1 AND id = $2
            "#
        };

        let invoice = sqlx::query_as::<_, Invoice>(sql)
            .bind(self.org_id)
            .bind(invoice_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| read_err("get invoice", e))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self, filter), fields(org_id = %self.org_id))]
    async fn list_invoices(&mut self, filter: &InvoiceFilter) -> Result<Vec<Invoice>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let status = filter
            .status
            .filter(|s| *s != InvoiceStatus::Partial)
            .map(|s| s.as_str());

        let invoices = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT id, org_id, customer_id, vehicle_id, date, tax_rate,
                discount_type, discount_value, status, notes, created_utc, updated_utc
            FROM invoices
            WHERE org_id = $1
              AND ($2::varchar IS NULL OR status = $2)
              AND ($3::uuid IS NULL OR customer_id = $3)
              AND ($4::uuid IS NULL OR vehicle_id = $4)
            ORDER BY date DESC, created_utc DESC
            "#,
        )
        .bind(self.org_id)
        .bind(status)
        .bind(filter.customer_id)
        .bind(filter.vehicle_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| read_err("list invoices", e))?;

        timer.observe_duration();

        Ok(invoices)
    }

    #[instrument(skip(self, update), fields(org_id = %self.org_id, invoice_id = %invoice_id))]
    async fn update_invoice_header(
        &mut self,
        invoice_id: Uuid,
        update: &InvoiceHeaderUpdate,
    ) -> Result<Option<Invoice>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["update_invoice_header"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(
            r#"
            UPDATE invoices
            SET customer_id = COALESCE($3, customer_id),
                vehicle_id = COALESCE($4, vehicle_id),
                date = COALESCE($5, date),
                tax_rate = COALESCE($6, tax_rate),
                discount_type = CASE WHEN $7 THEN $8 ELSE discount_type END,
                discount_value = CASE WHEN $7 THEN $9 ELSE discount_value END,
                status = COALESCE($10, status),
                notes = COALESCE($11, notes),
                updated_utc = NOW()
            WHERE org_id = $1 AND id = $2
            RETURNING id, org_id, customer_id, vehicle_id, date, tax_rate,
                discount_type, discount_value, status, notes, created_utc, updated_utc
            "#,
        )
        .bind(self.org_id)
        .bind(invoice_id)
        .bind(update.customer_id)
        .bind(update.vehicle_id)
        .bind(update.date)
        .bind(update.tax_rate)
        .bind(update.discount.is_some())
        .bind(update.discount.and_then(|d| d.type_str()))
        .bind(update.discount.map(|d| d.value()))
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.notes)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| write_err("update invoice", e))?;

        timer.observe_duration();

        Ok(invoice)
    }

    #[instrument(skip(self), fields(org_id = %self.org_id, invoice_id = %invoice_id))]
    async fn delete_invoice(&mut self, invoice_id: Uuid) -> Result<bool, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoices WHERE org_id = $1 AND id = $2")
            .bind(self.org_id)
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_err("delete invoice", e))?;

        timer.observe_duration();

        Ok(result.rows_affected() > 0)
    }

    // -------------------------------------------------------------------------
    // Invoice Item Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(org_id = %self.org_id, invoice_id = %invoice_id))]
    async fn list_items(&mut self, invoice_id: Uuid) -> Result<Vec<InvoiceItem>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["list_items"])
            .start_timer();

        let rows = sqlx::query_as::<_, InvoiceItemRow>(
            r#"
            SELECT id, invoice_id, position, description, kind, quantity, price,
                part_id, task_id, is_auto_added, creates_inventory_part, creates_task,
                custom_part_data, custom_labor_data, created_utc
            FROM invoice_items
            WHERE org_id = $1 AND invoice_id = $2
            ORDER BY position, created_utc
            "#,
        )
        .bind(self.org_id)
        .bind(invoice_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| read_err("list invoice items", e))?;

        timer.observe_duration();

        rows.into_iter().map(into_item).collect()
    }

    #[instrument(skip(self, items), fields(org_id = %self.org_id, invoice_id = %invoice_id, count = items.len()))]
    async fn insert_items(
        &mut self,
        invoice_id: Uuid,
        items: &[NewInvoiceItem],
    ) -> Result<Vec<InvoiceItem>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["insert_items"])
            .start_timer();

        let mut inserted = Vec::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let flat = item.line.to_flat();
            let row = sqlx::query_as::<_, InvoiceItemRow>(
                r#"
                INSERT INTO invoice_items (
                    id, org_id, invoice_id, position, description, kind, quantity, price,
                    part_id, task_id, is_auto_added, creates_inventory_part, creates_task,
                    custom_part_data, custom_labor_data
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                RETURNING id, invoice_id, position, description, kind, quantity, price,
                    part_id, task_id, is_auto_added, creates_inventory_part, creates_task,
                    custom_part_data, custom_labor_data, created_utc
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(self.org_id)
            .bind(invoice_id)
            .bind(position as i32)
            .bind(&item.description)
            .bind(flat.kind)
            .bind(item.quantity)
            .bind(item.price)
            .bind(flat.part_id)
            .bind(flat.task_id)
            .bind(item.is_auto_added)
            .bind(flat.creates_inventory_part)
            .bind(flat.creates_task)
            .bind(flat.custom_part_data.map(Json))
            .bind(flat.custom_labor_data.map(Json))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| write_err("insert invoice item", e))?;

            inserted.push(into_item(row)?);
        }

        timer.observe_duration();

        Ok(inserted)
    }

    #[instrument(skip(self, item), fields(org_id = %self.org_id, item_id = %item.id))]
    async fn relink_item(&mut self, item: &InvoiceItem) -> Result<(), StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["relink_item"])
            .start_timer();

        let flat = item.line.to_flat();
        sqlx::query(
            r#"
            UPDATE invoice_items
            SET kind = $3,
                part_id = $4,
                task_id = $5,
                creates_inventory_part = $6,
                creates_task = $7,
                custom_part_data = $8,
                custom_labor_data = $9
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(self.org_id)
        .bind(item.id)
        .bind(flat.kind)
        .bind(flat.part_id)
        .bind(flat.task_id)
        .bind(flat.creates_inventory_part)
        .bind(flat.creates_task)
        .bind(flat.custom_part_data.map(Json))
        .bind(flat.custom_labor_data.map(Json))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_err("relink invoice item", e))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self), fields(org_id = %self.org_id, invoice_id = %invoice_id))]
    async fn delete_items(&mut self, invoice_id: Uuid) -> Result<u64, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["delete_items"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoice_items WHERE org_id = $1 AND invoice_id = $2")
            .bind(self.org_id)
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_err("delete invoice items", e))?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Payment Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(org_id = %self.org_id, invoice_id = %invoice_id))]
    async fn list_payments(&mut self, invoice_id: Uuid) -> Result<Vec<Payment>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["list_payments"])
            .start_timer();

        let payments = sqlx::query_as::<_, Payment>(
            r#"
            SELECT id, invoice_id, amount, method, date, notes
            FROM payments
            WHERE org_id = $1 AND invoice_id = $2
            ORDER BY date, id
            "#,
        )
        .bind(self.org_id)
        .bind(invoice_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| read_err("list payments", e))?;

        timer.observe_duration();

        Ok(payments)
    }

    #[instrument(skip(self, payment), fields(org_id = %self.org_id, payment_id = %payment.id))]
    async fn insert_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["insert_payment"])
            .start_timer();

        sqlx::query(
            r#"
            INSERT INTO payments (id, org_id, invoice_id, amount, method, date, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(payment.id)
        .bind(self.org_id)
        .bind(payment.invoice_id)
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(payment.date)
        .bind(&payment.notes)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_err("insert payment", e))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self, payment), fields(org_id = %self.org_id, payment_id = %payment.id))]
    async fn update_payment(&mut self, payment: &Payment) -> Result<(), StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["update_payment"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE payments
            SET amount = $4, method = $5, date = $6, notes = $7
            WHERE org_id = $1 AND invoice_id = $2 AND id = $3
            "#,
        )
        .bind(self.org_id)
        .bind(payment.invoice_id)
        .bind(payment.id)
        .bind(payment.amount)
        .bind(&payment.method)
        .bind(payment.date)
        .bind(&payment.notes)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_err("update payment", e))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(
        skip(self),
        fields(org_id = %self.org_id, invoice_id = %invoice_id, payment_id = %payment_id)
    )]
    async fn delete_payment(
        &mut self,
        invoice_id: Uuid,
        payment_id: Uuid,
    ) -> Result<(), StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["delete_payment"])
            .start_timer();

        sqlx::query("DELETE FROM payments WHERE org_id = $1 AND invoice_id = $2 AND id = $3")
            .bind(self.org_id)
            .bind(invoice_id)
            .bind(payment_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_err("delete payment", e))?;

        timer.observe_duration();

        Ok(())
    }

    #[instrument(skip(self), fields(org_id = %self.org_id, invoice_id = %invoice_id))]
    async fn delete_payments(&mut self, invoice_id: Uuid) -> Result<u64, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["delete_payments"])
            .start_timer();

        let result = sqlx::query("DELETE FROM payments WHERE org_id = $1 AND invoice_id = $2")
            .bind(self.org_id)
            .bind(invoice_id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_err("delete payments", e))?;

        timer.observe_duration();

        Ok(result.rows_affected())
    }

    // -------------------------------------------------------------------------
    // Part Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(org_id = %self.org_id, part_id = %part_id))]
    async fn get_part(&mut self, part_id: Uuid, lock: bool) -> Result<Option<Part>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["get_part"])
            .start_timer();

        let sql = if lock {
            r#"
            SELECT id, org_id, name, price, quantity, part_number, manufacturer, category,
                location, vendor_id, invoice_ids, created_utc
            FROM parts
            WHERE org_id = $1 AND id = $2
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, org_id, name, price, quantity, part_number, manufacturer, category,
                location, vendor_id, invoice_ids, created_utc
            FROM parts
            WHERE org_id = $1 AND id = $2
            "#
        };

        let part = sqlx::query_as::<_, Part>(sql)
            .bind(self.org_id)
            .bind(part_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| read_err("get part", e))?;

        timer.observe_duration();

        Ok(part)
    }

    #[instrument(skip(self, part), fields(org_id = %self.org_id, name = %part.name))]
    async fn insert_part(&mut self, part: &NewPart) -> Result<Part, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["insert_part"])
            .start_timer();

        let part = sqlx::query_as::<_, Part>(
            r#"
            INSERT INTO parts (
                id, org_id, name, price, quantity, part_number, manufacturer, category,
                location, vendor_id, invoice_ids
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, org_id, name, price, quantity, part_number, manufacturer, category,
                location, vendor_id, invoice_ids, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.org_id)
        .bind(&part.name)
        .bind(part.price)
        .bind(part.quantity)
        .bind(&part.part_number)
        .bind(&part.manufacturer)
        .bind(&part.category)
        .bind(&part.location)
        .bind(part.vendor_id)
        .bind(&part.invoice_ids)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| write_err("create part", e))?;

        timer.observe_duration();

        Ok(part)
    }

    #[instrument(skip(self, part), fields(org_id = %self.org_id, part_id = %part.id))]
    async fn update_part_stock(&mut self, part: &Part) -> Result<(), StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["update_part_stock"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE parts
            SET quantity = $3, invoice_ids = $4
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(self.org_id)
        .bind(part.id)
        .bind(part.quantity)
        .bind(&part.invoice_ids)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_err("update part stock", e))?;

        timer.observe_duration();

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Task Operations
    // -------------------------------------------------------------------------

    #[instrument(skip(self), fields(org_id = %self.org_id, task_id = %task_id))]
    async fn get_task(&mut self, task_id: Uuid, lock: bool) -> Result<Option<Task>, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["get_task"])
            .start_timer();

        let sql = if lock {
            r#"
            SELECT id, org_id, title, description, status, hours_estimated, hours_spent,
                price, invoice_id, created_utc
            FROM tasks
            WHERE org_id = $1 AND id = $2
            FOR UPDATE
            "#
        } else {
            r#"
            SELECT id, org_id, title, description, status, hours_estimated, hours_spent,
                price, invoice_id, created_utc
            FROM tasks
            WHERE org_id = $1 AND id = $2
            "#
        };

        let task = sqlx::query_as::<_, Task>(sql)
            .bind(self.org_id)
            .bind(task_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| read_err("get task", e))?;

        timer.observe_duration();

        Ok(task)
    }

    #[instrument(skip(self, task), fields(org_id = %self.org_id, title = %task.title))]
    async fn insert_task(&mut self, task: &NewTask) -> Result<Task, StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["insert_task"])
            .start_timer();

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (
                id, org_id, title, description, status, hours_estimated, hours_spent,
                price, invoice_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, org_id, title, description, status, hours_estimated, hours_spent,
                price, invoice_id, created_utc
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(self.org_id)
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.status.as_str())
        .bind(task.hours_estimated)
        .bind(task.hours_spent)
        .bind(task.price)
        .bind(task.invoice_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| write_err("create task", e))?;

        timer.observe_duration();

        Ok(task)
    }

    #[instrument(skip(self, task), fields(org_id = %self.org_id, task_id = %task.id))]
    async fn update_task_billing(&mut self, task: &Task) -> Result<(), StoreError> {
        let timer = STORE_QUERY_DURATION
            .with_label_values(&["update_task_billing"])
            .start_timer();

        sqlx::query(
            r#"
            UPDATE tasks
            SET invoice_id = $3, price = $4
            WHERE org_id = $1 AND id = $2
            "#,
        )
        .bind(self.org_id)
        .bind(task.id)
        .bind(task.invoice_id)
        .bind(task.price)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| write_err("update task billing", e))?;

        timer.observe_duration();

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Transaction Control
    // -------------------------------------------------------------------------

    async fn savepoint(&mut self) -> Result<(), StoreError> {
        sqlx::query(&format!("SAVEPOINT {}", SAVEPOINT))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_err("create savepoint", e))?;
        Ok(())
    }

    async fn release_savepoint(&mut self) -> Result<(), StoreError> {
        sqlx::query(&format!("RELEASE SAVEPOINT {}", SAVEPOINT))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_err("release savepoint", e))?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), StoreError> {
        sqlx::query(&format!("ROLLBACK TO SAVEPOINT {}", SAVEPOINT))
            .execute(&mut *self.tx)
            .await
            .map_err(|e| write_err("roll back to savepoint", e))?;
        self.release_savepoint().await
    }

    #[instrument(skip(self), fields(org_id = %self.org_id))]
    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| write_err("commit transaction", e))
    }
}
