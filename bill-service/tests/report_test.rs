//! Summary report integration tests for bill-service.

mod common;

use common::{json_body, TestApp};
use serde_json::json;

async fn app_with_bills() -> TestApp {
    let app = TestApp::spawn().await;
    let customer_id = app.create_customer("Umbrella").await;
    let service_id = app.create_service("Audit", "100.00").await;

    for (date, quantity, is_paid) in [
        ("2025-01-15", 1, true),
        ("2025-02-15", 2, false),
        ("2025-03-15", 3, true),
        ("2025-04-15", 4, false),
    ] {
        app.create_bill(&json!({
            "customer_id": customer_id,
            "date": date,
            "is_paid": is_paid,
            "items": [{ "service_id": service_id, "quantity": quantity }]
        }))
        .await;
    }
    app
}

#[tokio::test]
async fn summary_over_all_bills() {
    let app = app_with_bills().await;

    let response = app.get("/api/reports/summary").await;
    assert_eq!(response.status().as_u16(), 200);
    let body = json_body(response).await;
    assert_eq!(body["success"], json!(true));

    let summary = &body["data"];
    assert_eq!(summary["bill_count"], json!(4));
    assert_eq!(summary["paid_count"], json!(2));
    assert_eq!(summary["unpaid_count"], json!(2));
    assert_eq!(summary["paid_total"], json!(400.0));
    assert_eq!(summary["unpaid_total"], json!(600.0));
    assert_eq!(summary["grand_total"], json!(1000.0));
    assert_eq!(summary["filtered_count"], json!(4));
}

#[tokio::test]
async fn summary_respects_date_range_and_status() {
    let app = app_with_bills().await;

    let body = json_body(
        app.get("/reports/summary?from=2025-02-01&to=2025-03-31&status=unpaid")
            .await,
    )
    .await;
    let summary = &body["data"];
    assert_eq!(summary["bill_count"], json!(2));
    assert_eq!(summary["paid_total"], json!(300.0));
    assert_eq!(summary["unpaid_total"], json!(200.0));
    assert_eq!(summary["filtered_count"], json!(1));
    assert_eq!(summary["filtered_total"], json!(200.0));
}

#[tokio::test]
async fn summary_excludes_deleted_bills() {
    let app = app_with_bills().await;

    let bills = json_body(app.get("/api/bills").await).await;
    let first = bills["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|b| b["bill_number"] == "INV-25-0001")
        .unwrap()["id"]
        .as_i64()
        .unwrap();
    app.delete(&format!("/api/bills/{}", first)).await;

    let body = json_body(app.get("/api/reports/summary?status=paid").await).await;
    assert_eq!(body["data"]["bill_count"], json!(3));
    assert_eq!(body["data"]["paid_total"], json!(300.0));
    assert_eq!(body["data"]["filtered_total"], json!(300.0));
}

#[tokio::test]
async fn bad_report_parameters_are_rejected() {
    let app = app_with_bills().await;

    for query in ["?from=yesterday", "?to=2025-13-01", "?status=overdue"] {
        let response = app.get(&format!("/api/reports/summary{}", query)).await;
        assert_eq!(response.status().as_u16(), 400, "{}", query);
        assert_eq!(json_body(response).await["success"], json!(false));
    }
}
