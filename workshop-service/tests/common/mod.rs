//! Test helper module for workshop-service integration tests.
//!
//! Every `TestApp` runs over its own `MemoryStore`, so tests are isolated
//! without a database.

#![allow(dead_code)]

use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::config::Config as CoreConfig;
use std::sync::{Arc, Once};
use uuid::Uuid;
use workshop_service::config::{StoreBackend, WorkshopConfig};
use workshop_service::models::{
    CustomLaborData, CustomPartData, Discount, InvoiceStatus, ItemLine, LaborLine, NewInvoice,
    NewInvoiceHeader, NewInvoiceItem, NewPart, NewTask, Part, PartLine, Task, TaskStatus,
};
use workshop_service::services::{InvoiceReconciler, MemoryStore};
use workshop_service::startup::Application;

pub const TEST_ORG_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const OTHER_ORG_ID: &str = "99999999-9999-9999-9999-999999999999";
pub const TEST_CUSTOMER_ID: &str = "22222222-2222-2222-2222-222222222222";
pub const TEST_VEHICLE_ID: &str = "33333333-3333-3333-3333-333333333333";

static TRACING: Once = Once::new();

/// Route test logs through `tracing` when `TEST_LOG` is set.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        if std::env::var("TEST_LOG").is_ok() {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
                .with_test_writer()
                .init();
        }
    });
}

pub fn org_id() -> Uuid {
    Uuid::parse_str(TEST_ORG_ID).unwrap()
}

pub fn other_org_id() -> Uuid {
    Uuid::parse_str(OTHER_ORG_ID).unwrap()
}

/// Reconciler over a fresh in-memory store.
pub struct TestStore {
    pub store: MemoryStore,
    pub reconciler: InvoiceReconciler,
}

impl TestStore {
    pub fn new() -> Self {
        init_test_tracing();
        let store = MemoryStore::new();
        let reconciler = InvoiceReconciler::new(Arc::new(store.clone()));
        Self { store, reconciler }
    }

    pub async fn seed_part(&self, name: &str, quantity: Decimal, price: Decimal) -> Part {
        self.reconciler
            .create_part(
                org_id(),
                NewPart {
                    name: name.to_string(),
                    price,
                    quantity,
                    part_number: None,
                    manufacturer: None,
                    category: None,
                    location: None,
                    vendor_id: None,
                    invoice_ids: Vec::new(),
                },
            )
            .await
            .expect("Failed to seed part")
    }

    pub async fn seed_task(&self, title: &str) -> Task {
        self.reconciler
            .create_task(
                org_id(),
                NewTask {
                    title: title.to_string(),
                    description: None,
                    status: TaskStatus::InProgress,
                    hours_estimated: Decimal::ONE,
                    hours_spent: Decimal::ZERO,
                    price: Decimal::ZERO,
                    invoice_id: None,
                },
            )
            .await
            .expect("Failed to seed task")
    }

    pub async fn part(&self, part_id: Uuid) -> Part {
        self.reconciler
            .get_part(org_id(), part_id)
            .await
            .expect("Part should exist")
    }

    pub async fn task(&self, task_id: Uuid) -> Task {
        self.reconciler
            .get_task(org_id(), task_id)
            .await
            .expect("Task should exist")
    }

    /// Number of parts and tasks in the test organization.
    pub async fn inventory_counts(&self) -> (usize, usize) {
        (
            self.store.parts(org_id()).await.len(),
            self.store.tasks(org_id()).await.len(),
        )
    }
}

pub fn header() -> NewInvoiceHeader {
    NewInvoiceHeader {
        customer_id: Uuid::parse_str(TEST_CUSTOMER_ID).unwrap(),
        vehicle_id: Uuid::parse_str(TEST_VEHICLE_ID).unwrap(),
        date: NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(),
        tax_rate: Decimal::ZERO,
        discount: Discount::None,
        status: InvoiceStatus::Open,
        notes: None,
    }
}

pub fn new_invoice(items: Vec<NewInvoiceItem>) -> NewInvoice {
    NewInvoice {
        header: header(),
        items,
    }
}

pub fn stock_item(part_id: Uuid, quantity: Decimal, price: Decimal) -> NewInvoiceItem {
    NewInvoiceItem {
        description: "Stock part".to_string(),
        quantity,
        price,
        is_auto_added: false,
        line: ItemLine::Part(PartLine::Stock { part_id }),
    }
}

pub fn custom_part_item(name: &str, quantity: Decimal, price: Decimal) -> NewInvoiceItem {
    NewInvoiceItem {
        description: name.to_string(),
        quantity,
        price,
        is_auto_added: false,
        line: ItemLine::Part(PartLine::Custom(CustomPartData {
            name: name.to_string(),
            part_number: Some("CP-1".to_string()),
            manufacturer: Some("Bosch".to_string()),
            category: None,
            location: None,
            vendor_id: None,
        })),
    }
}

pub fn task_item(task_id: Uuid, hours: Decimal, price: Decimal) -> NewInvoiceItem {
    NewInvoiceItem {
        description: "Labor".to_string(),
        quantity: hours,
        price,
        is_auto_added: false,
        line: ItemLine::Labor(LaborLine::Task { task_id }),
    }
}

pub fn custom_labor_item(title: &str, hours: Decimal, price: Decimal) -> NewInvoiceItem {
    NewInvoiceItem {
        description: title.to_string(),
        quantity: hours,
        price,
        is_auto_added: false,
        line: ItemLine::Labor(LaborLine::Custom(CustomLaborData {
            title: title.to_string(),
            description: Some("Added from invoice".to_string()),
        })),
    }
}

pub fn other_item(description: &str, price: Decimal) -> NewInvoiceItem {
    NewInvoiceItem {
        description: description.to_string(),
        quantity: Decimal::ONE,
        price,
        is_auto_added: false,
        line: ItemLine::Other { custom_part: None },
    }
}

/// Running application over a fresh in-memory store.
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: MemoryStore,
    pub client: reqwest::Client,
}

impl TestApp {
    /// Spawn a new test application on a random port.
    pub async fn spawn() -> Self {
        init_test_tracing();

        let config = WorkshopConfig {
            common: CoreConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
            service_name: "workshop-service-test".to_string(),
            log_level: "warn".to_string(),
            otlp_endpoint: None,
            store: StoreBackend::Memory,
        };

        let store = MemoryStore::new();
        let app = Application::build_with_store(config, Arc::new(store.clone()))
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = reqwest::Client::new();
        for _ in 0..50 {
            if client
                .get(format!("{}/health", address))
                .send()
                .await
                .is_ok()
            {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            store,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// GET with the test organization header.
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("X-Org-ID", TEST_ORG_ID)
    }

    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("X-Org-ID", TEST_ORG_ID)
    }

    pub fn patch(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .patch(self.url(path))
            .header("X-Org-ID", TEST_ORG_ID)
    }

    pub fn delete(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("X-Org-ID", TEST_ORG_ID)
    }
}
