//! Invoice removal integration tests.

mod common;

use common::{new_invoice, org_id, other_org_id, stock_item, task_item, TestStore};
use rust_decimal_macros::dec;
use uuid::Uuid;
use workshop_service::models::{InvoiceFilter, InvoiceUpdate, PaymentDraft};
use workshop_service::services::ReconcileError;

#[tokio::test]
async fn remove_invoice_leaves_inventory_as_is() {
    let t = TestStore::new();
    let pads = t.seed_part("Brake pads", dec!(10), dec!(20)).await;
    let bleed = t.seed_task("Brake bleed").await;

    let created = t
        .reconciler
        .create_invoice(
            org_id(),
            new_invoice(vec![
                stock_item(pads.id, dec!(4), dec!(20)),
                task_item(bleed.id, dec!(1), dec!(70)),
            ]),
        )
        .await
        .unwrap();
    let invoice_id = created.invoice.invoice.id;

    t.reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            InvoiceUpdate {
                payments: Some(vec![PaymentDraft {
                    amount: 50.0,
                    ..Default::default()
                }]),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    t.reconciler
        .remove_invoice(org_id(), invoice_id)
        .await
        .expect("Failed to remove invoice");

    let result = t.reconciler.get_invoice(org_id(), invoice_id).await;
    assert!(matches!(result, Err(ReconcileError::NotFound(_))));

    // Stock is not put back and links are not cleared
    let pads = t.part(pads.id).await;
    assert_eq!(pads.quantity, dec!(6));
    assert_eq!(pads.invoice_ids, vec![invoice_id]);
    assert_eq!(t.task(bleed.id).await.invoice_id, Some(invoice_id));
}

#[tokio::test]
async fn remove_missing_invoice_is_not_found() {
    let t = TestStore::new();

    let result = t.reconciler.remove_invoice(org_id(), Uuid::new_v4()).await;

    assert!(matches!(result, Err(ReconcileError::NotFound(_))));
}

#[tokio::test]
async fn remove_is_scoped_to_the_organization() {
    let t = TestStore::new();
    let created = t
        .reconciler
        .create_invoice(org_id(), new_invoice(Vec::new()))
        .await
        .unwrap();
    let invoice_id = created.invoice.invoice.id;

    let result = t.reconciler.remove_invoice(other_org_id(), invoice_id).await;
    assert!(matches!(result, Err(ReconcileError::NotFound(_))));

    let remaining = t
        .reconciler
        .list_invoices(org_id(), &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].invoice.id, invoice_id);

    let foreign = t
        .reconciler
        .list_invoices(other_org_id(), &InvoiceFilter::default())
        .await
        .unwrap();
    assert!(foreign.is_empty());
}
