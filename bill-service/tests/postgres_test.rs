//! PostgreSQL-backed integration tests for bill-service.
//!
//! Run with `TEST_DATABASE_URL` pointing at a disposable database:
//! `cargo test -p bill-service --test postgres_test -- --ignored`

mod common;

use bill_service::models::{BillDraft, BillLine, CreateCustomer, CreateService, NewBill};
use bill_service::services::store::BILL_NUMBER_CONSTRAINT;
use bill_service::services::StoreError;
use chrono::NaiveDate;
use common::{json_body, TestApp};
use rust_decimal::Decimal;
use serde_json::json;
use serial_test::serial;
use std::collections::HashSet;
use std::str::FromStr;

async fn seed(app: &TestApp) -> (i64, i64) {
    let customer = app
        .store
        .create_customer(&CreateCustomer {
            name: "Acme".to_string(),
            email: "acme@example.com".to_string(),
            phone: "555-0100".to_string(),
            address: None,
        })
        .await
        .unwrap();
    let service = app
        .store
        .create_service(&CreateService {
            name: "Design".to_string(),
            description: None,
            price: Decimal::from_str("120.50").unwrap(),
        })
        .await
        .unwrap();
    (customer.id, service.id)
}

fn new_bill<'a>(number: &str, customer_id: i64, draft: &'a BillDraft) -> NewBill<'a> {
    NewBill {
        bill_number: number.to_string(),
        customer_id,
        date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
        is_paid: false,
        draft,
    }
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn duplicate_bill_number_is_classified_by_constraint() {
    let app = TestApp::spawn_postgres().await;
    let (customer_id, service_id) = seed(&app).await;
    let draft = BillDraft::from_lines(vec![BillLine::new(
        service_id,
        1,
        Decimal::from_str("120.50").unwrap(),
    )]);

    app.store
        .insert_bill(&new_bill("INV-25-0001", customer_id, &draft))
        .await
        .unwrap();
    let err = app
        .store
        .insert_bill(&new_bill("INV-25-0001", customer_id, &draft))
        .await
        .unwrap_err();

    assert!(err.is_unique_violation_of(BILL_NUMBER_CONSTRAINT), "{:?}", err);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn foreign_key_failure_writes_nothing() {
    let app = TestApp::spawn_postgres().await;
    let (customer_id, _) = seed(&app).await;
    let draft = BillDraft::from_lines(vec![BillLine::new(9999, 1, Decimal::ONE)]);

    let err = app
        .store
        .insert_bill(&new_bill("INV-25-0001", customer_id, &draft))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::ForeignKeyViolation { .. }), "{:?}", err);

    assert!(app.store.list_bills().await.unwrap().is_empty());
    assert_eq!(
        app.store
            .max_bill_number_with_prefix("INV-25-")
            .await
            .unwrap(),
        None
    );

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn numbering_counts_deleted_bills_and_is_year_scoped() {
    let app = TestApp::spawn_postgres().await;
    let (customer_id, service_id) = seed(&app).await;

    let mut ids = Vec::new();
    for date in ["2025-01-01", "2025-01-02", "2026-01-01"] {
        let body = app
            .create_bill(&json!({
                "customer_id": customer_id,
                "date": date,
                "items": [{ "service_id": service_id }]
            }))
            .await;
        ids.push(body["data"]["id"].as_i64().unwrap());
    }

    app.delete(&format!("/api/bills/{}", ids[1])).await;

    let body = app
        .create_bill(&json!({
            "customer_id": customer_id,
            "date": "2025-05-05",
            "items": [{ "service_id": service_id, "quantity": 2 }]
        }))
        .await;
    assert_eq!(body["data"]["bill_number"], "INV-25-0003");
    assert_eq!(body["data"]["total"], json!(241.0));

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn concurrent_creates_are_unique_on_postgres() {
    let app = TestApp::spawn_postgres().await;
    let (customer_id, service_id) = seed(&app).await;

    let payload = json!({
        "customer_id": customer_id,
        "date": "2025-08-08",
        "items": [{ "service_id": service_id }]
    });
    let requests = (0..10).map(|_| app.post("/api/bills", &payload));
    let responses = futures::future::join_all(requests).await;

    let mut numbers = HashSet::new();
    for response in responses {
        assert_eq!(response.status().as_u16(), 201);
        let body = json_body(response).await;
        numbers.insert(body["data"]["bill_number"].as_str().unwrap().to_string());
    }
    let expected: HashSet<String> = (1..=10).map(|n| format!("INV-25-{:04}", n)).collect();
    assert_eq!(numbers, expected);

    app.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn update_replaces_items_atomically() {
    let app = TestApp::spawn_postgres().await;
    let (customer_id, service_id) = seed(&app).await;

    let body = app
        .create_bill(&json!({
            "customer_id": customer_id,
            "date": "2025-03-03",
            "items": [
                { "service_id": service_id },
                { "service_id": service_id, "quantity": 2 }
            ]
        }))
        .await;
    let id = body["data"]["id"].as_i64().unwrap();
    let path = format!("/api/bills/{}", id);

    // An unknown service leaves the original items in place.
    let response = app
        .put(&path, &json!({ "items": [{ "service_id": 4242 }] }))
        .await;
    assert_eq!(response.status().as_u16(), 404);
    let body = json_body(app.get(&path).await).await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 2);

    let body = json_body(
        app.put(
            &path,
            &json!({ "items": [{ "service_id": service_id, "unit_price": "0.01", "quantity": 3 }] }),
        )
        .await,
    )
    .await;
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"]["total"], json!(0.03));
    assert_eq!(body["data"]["bill_number"], "INV-25-0001");

    app.cleanup().await;
}

/// Tables as the earlier release created them: SERIAL keys, floating point
/// money, naive timestamps filled in by the application, no item position.
const LEGACY_SCHEMA: &str = r#"
CREATE TABLE customers (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    email VARCHAR(120) NOT NULL,
    phone VARCHAR(20) NOT NULL,
    address TEXT,
    created_at TIMESTAMP,
    updated_at TIMESTAMP,
    is_deleted BOOLEAN
);
CREATE TABLE services (
    id SERIAL PRIMARY KEY,
    name VARCHAR(100) NOT NULL,
    description TEXT,
    price DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMP,
    updated_at TIMESTAMP,
    is_deleted BOOLEAN
);
CREATE TABLE bills (
    id SERIAL PRIMARY KEY,
    bill_number VARCHAR(50) NOT NULL UNIQUE,
    customer_id INTEGER NOT NULL REFERENCES customers (id),
    total DOUBLE PRECISION NOT NULL,
    date DATE NOT NULL,
    is_paid BOOLEAN,
    created_at TIMESTAMP,
    updated_at TIMESTAMP,
    is_deleted BOOLEAN
);
CREATE TABLE bill_items (
    id SERIAL PRIMARY KEY,
    bill_id INTEGER NOT NULL REFERENCES bills (id),
    service_id INTEGER NOT NULL REFERENCES services (id),
    quantity INTEGER NOT NULL,
    unit_price DOUBLE PRECISION NOT NULL,
    line_total DOUBLE PRECISION NOT NULL,
    created_at TIMESTAMP,
    updated_at TIMESTAMP
);

INSERT INTO customers (name, email, phone, created_at, updated_at, is_deleted)
VALUES ('Acme', 'acme@example.com', '555-0100', NOW(), NOW(), FALSE);
INSERT INTO services (name, price) VALUES ('Design', 120.5);
INSERT INTO bills (bill_number, customer_id, total, date, is_paid)
VALUES ('INV-25-0007', 1, 241.0, '2025-02-01', TRUE);
INSERT INTO bill_items (bill_id, service_id, quantity, unit_price, line_total)
VALUES (1, 1, 2, 120.5, 241.0);
"#;

#[tokio::test]
#[ignore] // Requires PostgreSQL
#[serial]
async fn migrations_upgrade_a_legacy_schema() {
    let app = TestApp::spawn_postgres_with(LEGACY_SCHEMA).await;

    let bills = app.store.list_bills().await.unwrap();
    assert_eq!(bills.len(), 1);
    let legacy = &bills[0];
    assert_eq!(legacy.bill_number, "INV-25-0007");
    assert_eq!(legacy.total, Decimal::from_str("241").unwrap());
    assert!(legacy.is_paid);
    assert_eq!(legacy.customer_name.as_deref(), Some("Acme"));
    assert_eq!(legacy.items.len(), 1);
    assert_eq!(legacy.items[0].service_name.as_deref(), Some("Design"));

    let services = app.store.list_services().await.unwrap();
    assert_eq!(services[0].price, Decimal::from_str("120.5").unwrap());

    // New rows rely on the server-side defaults the upgrade installs.
    let customer_id = app.create_customer("Globex").await;
    let body = app
        .create_bill(&json!({
            "customer_id": customer_id,
            "date": "2025-06-01",
            "items": [{ "service_id": services[0].id }]
        }))
        .await;
    assert_eq!(body["data"]["bill_number"], "INV-25-0008");
    assert_eq!(body["data"]["is_paid"], json!(false));

    app.cleanup().await;
}
