//! Payment reconciliation integration tests.

mod common;

use chrono::{TimeZone, Utc};
use common::{new_invoice, org_id, other_item, stock_item, TestStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;
use workshop_service::models::{
    InvoiceFilter, InvoiceHeaderUpdate, InvoiceStatus, InvoiceUpdate, PaymentDraft,
};
use workshop_service::services::ReconcileError;

fn draft(id: Option<String>, amount: f64, date: &str) -> PaymentDraft {
    PaymentDraft {
        id,
        amount,
        method: Some("card".to_string()),
        date: Some(date.to_string()),
        notes: None,
    }
}

fn set_payments(payments: Vec<PaymentDraft>) -> InvoiceUpdate {
    InvoiceUpdate {
        payments: Some(payments),
        ..Default::default()
    }
}

async fn invoice_for(t: &TestStore, amount: Decimal) -> Uuid {
    t.reconciler
        .create_invoice(org_id(), new_invoice(vec![other_item("Service", amount)]))
        .await
        .expect("Failed to create invoice")
        .invoice
        .invoice
        .id
}

#[tokio::test]
async fn payments_are_inserted_updated_and_deleted_by_id() {
    let t = TestStore::new();
    let invoice_id = invoice_for(&t, dec!(100)).await;

    let first = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            set_payments(vec![
                draft(None, 40.0, "2026-05-01"),
                draft(Some("temp-1".to_string()), 10.0, "2026-05-02"),
            ]),
        )
        .await
        .unwrap()
        .invoice;

    assert_eq!(first.payments.len(), 2);
    assert_eq!(first.totals.amount_paid, dec!(50));
    assert_eq!(first.totals.balance_due, dec!(50));

    let kept = first.payments[0].id;
    let dropped = first.payments[1].id;
    assert_eq!(first.payments[0].amount, dec!(40));

    let second = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            set_payments(vec![
                draft(Some(kept.to_string()), 45.0, "2026-05-01"),
                draft(Some("temp-2".to_string()), 5.0, "2026-05-03"),
            ]),
        )
        .await
        .unwrap()
        .invoice;

    let ids: Vec<Uuid> = second.payments.iter().map(|p| p.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&kept));
    assert!(!ids.contains(&dropped));

    let updated = second.payments.iter().find(|p| p.id == kept).unwrap();
    assert_eq!(updated.amount, dec!(45));
    assert_eq!(second.totals.amount_paid, dec!(50));
}

#[tokio::test]
async fn payment_id_from_another_invoice_is_treated_as_new() {
    let t = TestStore::new();
    let invoice_a = invoice_for(&t, dec!(100)).await;
    let invoice_b = invoice_for(&t, dec!(80)).await;

    let b_payment = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_b,
            set_payments(vec![draft(None, 30.0, "2026-05-01")]),
        )
        .await
        .unwrap()
        .invoice
        .payments[0]
        .id;

    let a = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_a,
            set_payments(vec![draft(Some(b_payment.to_string()), 10.0, "2026-05-02")]),
        )
        .await
        .expect("A foreign payment id should not fail the update")
        .invoice;
    assert_eq!(a.payments.len(), 1);
    assert_ne!(a.payments[0].id, b_payment);
    assert_eq!(a.totals.amount_paid, dec!(10));

    // Clearing A's payments must not reach into B
    t.reconciler
        .update_invoice(org_id(), invoice_a, set_payments(Vec::new()))
        .await
        .unwrap();

    let b = t.reconciler.get_invoice(org_id(), invoice_b).await.unwrap();
    assert_eq!(b.payments.len(), 1);
    assert_eq!(b.payments[0].id, b_payment);
    assert_eq!(b.payments[0].amount, dec!(30));
}

#[tokio::test]
async fn unknown_payment_id_gets_a_fresh_id() {
    let t = TestStore::new();
    let invoice_id = invoice_for(&t, dec!(50)).await;
    let unknown = Uuid::new_v4();

    let detail = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            set_payments(vec![draft(Some(unknown.to_string()), 20.0, "2026-05-01")]),
        )
        .await
        .unwrap()
        .invoice;

    assert_eq!(detail.payments.len(), 1);
    assert_ne!(detail.payments[0].id, unknown);
}

#[tokio::test]
async fn empty_payment_list_clears_payments() {
    let t = TestStore::new();
    let invoice_id = invoice_for(&t, dec!(60)).await;

    t.reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            set_payments(vec![draft(None, 60.0, "2026-05-01")]),
        )
        .await
        .unwrap();

    let cleared = t
        .reconciler
        .update_invoice(org_id(), invoice_id, set_payments(Vec::new()))
        .await
        .unwrap()
        .invoice;

    assert!(cleared.payments.is_empty());
    assert_eq!(cleared.totals.balance_due, dec!(60));
}

#[tokio::test]
async fn omitted_payments_are_left_alone() {
    let t = TestStore::new();
    let invoice_id = invoice_for(&t, dec!(60)).await;

    t.reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            set_payments(vec![draft(None, 20.0, "2026-05-01")]),
        )
        .await
        .unwrap();

    let updated = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            InvoiceUpdate {
                header: InvoiceHeaderUpdate {
                    notes: Some("Paid in two parts".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .invoice;

    assert_eq!(updated.payments.len(), 1);
    assert_eq!(updated.totals.amount_paid, dec!(20));
}

#[tokio::test]
async fn payment_defaults_are_applied() {
    let t = TestStore::new();
    let invoice_id = invoice_for(&t, dec!(30)).await;

    let detail = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            set_payments(vec![PaymentDraft {
                amount: 12.5,
                date: Some("2026-04-30".to_string()),
                ..Default::default()
            }]),
        )
        .await
        .unwrap()
        .invoice;

    let payment = &detail.payments[0];
    assert_eq!(payment.method, "cash");
    assert_eq!(payment.amount, dec!(12.5));
    assert_eq!(payment.date, Utc.with_ymd_and_hms(2026, 4, 30, 0, 0, 0).unwrap());
}

#[tokio::test]
async fn non_finite_amount_aborts_before_any_write() {
    let t = TestStore::new();
    let oil = t.seed_part("Engine oil", dec!(10), dec!(9)).await;

    let created = t
        .reconciler
        .create_invoice(org_id(), new_invoice(vec![stock_item(oil.id, dec!(2), dec!(9))]))
        .await
        .unwrap();
    let invoice_id = created.invoice.invoice.id;

    let result = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            InvoiceUpdate {
                header: InvoiceHeaderUpdate {
                    notes: Some("should not stick".to_string()),
                    ..Default::default()
                },
                items: Some(vec![stock_item(oil.id, dec!(5), dec!(9))]),
                payments: Some(vec![draft(None, f64::NAN, "2026-05-01")]),
            },
        )
        .await;

    assert!(matches!(result, Err(ReconcileError::Validation(_))));

    let detail = t.reconciler.get_invoice(org_id(), invoice_id).await.unwrap();
    assert_eq!(detail.invoice.notes, None);
    assert_eq!(detail.items, created.invoice.items);
    assert!(detail.payments.is_empty());
    assert_eq!(t.part(oil.id).await.quantity, dec!(8));
}

#[tokio::test]
async fn unparseable_payment_date_is_rejected() {
    let t = TestStore::new();
    let invoice_id = invoice_for(&t, dec!(30)).await;

    let result = t
        .reconciler
        .update_invoice(
            org_id(),
            invoice_id,
            set_payments(vec![draft(None, 10.0, "next friday")]),
        )
        .await;

    assert!(matches!(result, Err(ReconcileError::Validation(_))));
}

#[tokio::test]
async fn partial_filter_lists_part_paid_invoices() {
    let t = TestStore::new();
    let part_paid = invoice_for(&t, dec!(100)).await;
    let paid = invoice_for(&t, dec!(100)).await;
    let _unpaid = invoice_for(&t, dec!(100)).await;

    t.reconciler
        .update_invoice(
            org_id(),
            part_paid,
            set_payments(vec![draft(None, 40.0, "2026-05-01")]),
        )
        .await
        .unwrap();
    t.reconciler
        .update_invoice(
            org_id(),
            paid,
            set_payments(vec![draft(None, 100.0, "2026-05-01")]),
        )
        .await
        .unwrap();

    let listed = t
        .reconciler
        .list_invoices(
            org_id(),
            &InvoiceFilter {
                status: Some(InvoiceStatus::Partial),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].invoice.id, part_paid);
    assert_eq!(listed[0].totals.balance_due, dec!(60));

    let all = t
        .reconciler
        .list_invoices(org_id(), &InvoiceFilter::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);
}
