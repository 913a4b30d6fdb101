//! HTTP API integration tests against a running workshop-service.

mod common;

use common::{TestApp, TEST_CUSTOMER_ID, TEST_VEHICLE_ID};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("expected a decimal, got {}", other),
    }
}

async fn create_part(app: &TestApp, name: &str, quantity: u32) -> Value {
    let response = app
        .post("/parts")
        .json(&json!({ "name": name, "price": 20, "quantity": quantity }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(response.status(), StatusCode::CREATED);
    response.json().await.unwrap()
}

fn invoice_body(items: Value) -> Value {
    json!({
        "customer_id": TEST_CUSTOMER_ID,
        "vehicle_id": TEST_VEHICLE_ID,
        "date": "2026-05-04",
        "tax_rate": 10,
        "items": items,
    })
}

#[tokio::test]
async fn health_and_readiness_report_ok() {
    let app = TestApp::spawn().await;

    let response = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "workshop-service");

    let response = app.client.get(app.url("/ready")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn requests_without_org_header_are_unauthorized() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(app.url("/invoices"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .client
        .get(app.url("/invoices"))
        .header("X-Org-ID", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invoice_lifecycle_over_http() {
    let app = TestApp::spawn().await;
    let part = create_part(&app, "Brake pads", 10).await;
    let part_id = part["id"].as_str().unwrap().to_string();

    // Create
    let response = app
        .post("/invoices")
        .json(&invoice_body(json!([
            { "description": "Brake pads", "kind": "part", "quantity": 2, "price": 20, "part_id": part_id },
            {
                "description": "Brake inspection",
                "kind": "labor",
                "quantity": 1,
                "price": 60,
                "creates_task": true,
                "custom_labor_data": { "title": "Brake inspection" }
            },
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created: Value = response.json().await.unwrap();
    let invoice_id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "open");
    assert_eq!(decimal(&created["totals"]["total"]), dec!(110));

    let effects = created["side_effects"].as_array().unwrap();
    assert_eq!(effects.len(), 2);
    assert_eq!(effects[0]["status"], "ok");
    assert_eq!(effects[0]["effect"]["type"], "stock_consumed");
    assert_eq!(decimal(&effects[0]["effect"]["quantity_after"]), dec!(8));
    assert_eq!(effects[1]["effect"]["type"], "task_created");

    // The labor item now points at the task it created
    let items = created["items"].as_array().unwrap();
    assert_eq!(items[1]["creates_task"], false);
    assert_eq!(items[1]["task_id"], effects[1]["effect"]["task_id"]);

    let part: Value = app
        .get(&format!("/parts/{}", part_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&part["quantity"]), dec!(8));

    // Update items and payments
    let response = app
        .patch(&format!("/invoices/{}", invoice_id))
        .json(&json!({
            "items": [
                { "description": "Brake pads", "kind": "part", "quantity": 4, "price": 20, "part_id": part_id },
            ],
            "payments": [
                { "id": "temp-1", "amount": 30, "date": "2026-05-05" },
            ],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated: Value = response.json().await.unwrap();
    assert_eq!(decimal(&updated["totals"]["total"]), dec!(88));
    assert_eq!(decimal(&updated["totals"]["amount_paid"]), dec!(30));
    assert_eq!(updated["payments"][0]["method"], "cash");

    let part: Value = app
        .get(&format!("/parts/{}", part_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(decimal(&part["quantity"]), dec!(6));

    // List with the derived partial filter
    let listed: Value = app
        .get("/invoices?status=partial")
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["invoices"][0]["id"], invoice_id.as_str());

    // Remove
    let response = app
        .delete(&format!("/invoices/{}", invoice_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .get(&format!("/invoices/{}", invoice_id))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn failed_side_effects_are_reported_per_item() {
    let app = TestApp::spawn().await;
    let missing = Uuid::new_v4();

    let response = app
        .post("/invoices")
        .json(&invoice_body(json!([
            { "description": "Ghost part", "kind": "part", "quantity": 1, "price": 5, "part_id": missing },
            { "description": "Shop supplies", "kind": "other", "quantity": 1, "price": 5 },
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = response.json().await.unwrap();
    let effects = body["side_effects"].as_array().unwrap();
    assert_eq!(effects[0]["status"], "failed");
    assert!(effects[0]["error"]
        .as_str()
        .unwrap()
        .contains(&missing.to_string()));
    assert_eq!(effects[1]["status"], "ok");
    assert_eq!(effects[1]["effect"]["type"], "none");
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let app = TestApp::spawn().await;

    // Zero quantity fails field validation
    let response = app
        .post("/invoices")
        .json(&invoice_body(json!([
            { "description": "Oil", "kind": "other", "quantity": 0, "price": 5 },
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Quantity beyond what an item row holds
    let response = app
        .post("/invoices")
        .json(&invoice_body(json!([
            { "description": "Oil", "kind": "other", "quantity": "79228162514264337593543950335", "price": 2 },
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Discount over 100 percent
    let mut body = invoice_body(json!([]));
    body["discount"] = json!({ "type": "percentage", "value": 150 });
    let response = app.post("/invoices").json(&body).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Labor item pointing at a part is malformed linkage
    let response = app
        .post("/invoices")
        .json(&invoice_body(json!([
            { "description": "Alignment", "kind": "labor", "quantity": 1, "price": 80, "part_id": Uuid::new_v4() },
        ])))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unparseable payment date
    let created: Value = app
        .post("/invoices")
        .json(&invoice_body(json!([])))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let response = app
        .patch(&format!("/invoices/{}", created["id"].as_str().unwrap()))
        .json(&json!({ "payments": [{ "amount": 10, "date": "someday" }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .get(&format!("/invoices/{}", Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn parts_and_tasks_endpoints() {
    let app = TestApp::spawn().await;

    let part = create_part(&app, "Air filter", 3).await;
    assert_eq!(part["name"], "Air filter");
    assert_eq!(part["invoice_ids"], json!([]));

    let response = app
        .post("/parts")
        .json(&json!({ "name": "Bad stock", "quantity": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .post("/tasks")
        .json(&json!({ "title": "Oil change", "hours_estimated": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let task: Value = response.json().await.unwrap();
    assert_eq!(task["status"], "pending");
    assert_eq!(task["invoice_id"], Value::Null);

    let fetched: Value = app
        .get(&format!("/tasks/{}", task["id"].as_str().unwrap()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["title"], "Oil change");

    let response = app
        .get(&format!("/parts/{}", Uuid::new_v4()))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn metrics_endpoint_exposes_invoice_counters() {
    let app = TestApp::spawn().await;

    app.post("/invoices")
        .json(&invoice_body(json!([])))
        .send()
        .await
        .unwrap();

    let response = app.client.get(app.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response.text().await.unwrap();
    assert!(body.contains("workshop_invoice_operations_total"));
}
