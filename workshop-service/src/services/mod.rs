//! Services module for workshop-service.

pub mod database;
pub mod memory;
pub mod metrics;
pub mod reconciler;
pub mod store;

pub use database::Database;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use reconciler::{
    InvoiceReconciler, ItemOutcome, ReconcileError, Reconciled, SideEffect,
};
pub use store::{BackingStore, StoreError, StoreSession};
