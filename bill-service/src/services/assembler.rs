//! Validates requested bill lines against the catalog and prices them.
//!
//! Request bodies are taken as raw JSON so that numbers and numeric strings
//! are both accepted, and so each failure can name the offending item. All
//! checks complete before anything is written.

use crate::models::{BillDraft, BillLine};
use crate::services::error::BillError;
use crate::services::store::Store;
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use tracing::instrument;

/// Customer and priced lines of a bill that passed validation.
#[derive(Debug, Clone)]
pub struct AssembledBill {
    pub customer_id: i64,
    pub draft: BillDraft,
}

/// Validates a create request: customer first, then every item in order.
#[instrument(skip_all)]
pub async fn assemble(store: &dyn Store, body: &Value) -> Result<AssembledBill, BillError> {
    let customer_id = resolve_customer(store, body.get("customer_id")).await?;
    let items = requested_items(body)?.unwrap_or_default();
    let draft = assemble_items(store, &items).await?;
    Ok(AssembledBill { customer_id, draft })
}

/// Parses `customer_id` and checks that the customer exists and is live.
pub async fn resolve_customer(
    store: &dyn Store,
    raw: Option<&Value>,
) -> Result<i64, BillError> {
    let raw = match raw {
        Some(v) if !is_blank(v) => v,
        _ => return Err(BillError::invalid("Customer is required")),
    };
    let customer_id =
        parse_int(raw).ok_or_else(|| BillError::invalid("customer_id must be an integer"))?;

    match store.get_customer(customer_id).await? {
        Some(_) => Ok(customer_id),
        None => Err(BillError::not_found("Customer not found")),
    }
}

/// The `items` list of a create request, or the top-level single-item
/// shorthand (`service_id`, `quantity`, `unit_price`) when `items` is absent
/// or empty.
///
/// `Ok(None)` means the body names no items at all.
pub fn requested_items(body: &Value) -> Result<Option<Vec<Value>>, BillError> {
    let listed = listed_items(body)?;
    match listed {
        Some(items) if !items.is_empty() => Ok(Some(items)),
        listed => Ok(shorthand_item(body).map(|item| vec![item]).or(listed)),
    }
}

/// The replacement item set of an update request.
///
/// The shorthand only applies when `items` is absent or `null`; an explicit
/// empty list is passed through for the caller to reject.
pub fn replacement_items(body: &Value) -> Result<Option<Vec<Value>>, BillError> {
    match listed_items(body)? {
        Some(items) => Ok(Some(items)),
        None => Ok(shorthand_item(body).map(|item| vec![item])),
    }
}

fn listed_items(body: &Value) -> Result<Option<Vec<Value>>, BillError> {
    match body.get("items") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items.clone())),
        Some(_) => Err(BillError::invalid("Items must be a non-empty list")),
    }
}

fn shorthand_item(body: &Value) -> Option<Value> {
    let service_id = body.get("service_id").filter(|v| !is_blank(v))?;
    let mut item = Map::new();
    item.insert("service_id".into(), service_id.clone());
    item.insert(
        "quantity".into(),
        body.get("quantity").cloned().unwrap_or_else(|| json!(1)),
    );
    item.insert(
        "unit_price".into(),
        body.get("unit_price").cloned().unwrap_or(Value::Null),
    );
    Some(Value::Object(item))
}

/// Validates and prices each item, stopping at the first failure.
pub async fn assemble_items(store: &dyn Store, items: &[Value]) -> Result<BillDraft, BillError> {
    if items.is_empty() {
        return Err(BillError::invalid("At least one service item is required"));
    }

    let mut lines = Vec::with_capacity(items.len());
    let mut total = Decimal::ZERO;
    for (idx, item) in items.iter().enumerate() {
        let n = idx + 1;
        let line = assemble_line(store, n, item).await?;
        total = total
            .checked_add(line.line_total)
            .ok_or_else(|| BillError::invalid("Bill total is out of range"))?;
        lines.push(line);
    }

    Ok(BillDraft { lines, total })
}

async fn assemble_line(store: &dyn Store, n: usize, item: &Value) -> Result<BillLine, BillError> {
    let service_id = match item.get("service_id") {
        Some(v) if !is_blank(v) => parse_int(v).ok_or_else(|| {
            BillError::invalid(format!("Item {}: service_id must be an integer", n))
        })?,
        _ => {
            return Err(BillError::invalid(format!(
                "Item {}: service_id is required",
                n
            )))
        }
    };

    let service = store
        .get_service(service_id)
        .await?
        .ok_or_else(|| BillError::not_found(format!("Service not found (id: {})", service_id)))?;

    let quantity = match item.get("quantity") {
        None | Some(Value::Null) => 1,
        Some(v) => {
            let q = parse_int(v).ok_or_else(|| {
                BillError::invalid(format!("Item {}: quantity must be an integer", n))
            })?;
            if q < 1 {
                return Err(BillError::invalid(format!(
                    "Item {}: quantity must be >= 1",
                    n
                )));
            }
            i32::try_from(q)
                .map_err(|_| BillError::invalid(format!("Item {}: quantity is too large", n)))?
        }
    };

    let unit_price = match item.get("unit_price") {
        Some(v) if !is_blank(v) => {
            let price = parse_decimal(v).ok_or_else(|| {
                BillError::invalid(format!("Item {}: unit_price must be a number", n))
            })?;
            if price < Decimal::ZERO {
                return Err(BillError::invalid(format!(
                    "Item {}: unit_price must be >= 0",
                    n
                )));
            }
            price
        }
        _ => service.price,
    };

    if Decimal::from(quantity).checked_mul(unit_price).is_none() {
        return Err(BillError::invalid(format!(
            "Item {}: line total is out of range",
            n
        )));
    }

    Ok(BillLine::new(service_id, quantity, unit_price))
}

/// `null`, or a string with nothing but whitespace.
pub(crate) fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Integral JSON numbers and numeric strings.
pub(crate) fn parse_int(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// JSON numbers and numeric strings, read exactly from their text.
pub(crate) fn parse_decimal(v: &Value) -> Option<Decimal> {
    let text = match v {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    text.parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateCustomer, CreateService};
    use crate::services::memory::MemoryStore;
    use std::str::FromStr;

    struct Catalog {
        store: MemoryStore,
        customer_id: i64,
        consulting_id: i64,
        hosting_id: i64,
    }

    async fn catalog() -> Catalog {
        let store = MemoryStore::new();
        let customer = store
            .create_customer(&CreateCustomer {
                name: "Acme".into(),
                email: "a@acme.test".into(),
                phone: "1".into(),
                address: None,
            })
            .await
            .unwrap();
        let consulting = store
            .create_service(&CreateService {
                name: "Consulting".into(),
                description: None,
                price: Decimal::from_str("120.50").unwrap(),
            })
            .await
            .unwrap();
        let hosting = store
            .create_service(&CreateService {
                name: "Hosting".into(),
                description: None,
                price: Decimal::from_str("9.99").unwrap(),
            })
            .await
            .unwrap();
        Catalog {
            store,
            customer_id: customer.id,
            consulting_id: consulting.id,
            hosting_id: hosting.id,
        }
    }

    fn message(err: BillError) -> String {
        err.to_string()
    }

    #[tokio::test]
    async fn prices_lines_and_sums_exactly() {
        let c = catalog().await;
        let body = json!({
            "customer_id": c.customer_id,
            "items": [
                { "service_id": c.consulting_id, "quantity": 3 },
                { "service_id": c.hosting_id.to_string(), "quantity": "2", "unit_price": "0.10" },
                { "service_id": c.hosting_id, "unit_price": 0.2 }
            ]
        });

        let bill = assemble(&c.store, &body).await.unwrap();
        let lines = &bill.draft.lines;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].unit_price, Decimal::from_str("120.50").unwrap());
        assert_eq!(lines[0].line_total, Decimal::from_str("361.50").unwrap());
        assert_eq!(lines[1].line_total, Decimal::from_str("0.20").unwrap());
        assert_eq!(lines[2].quantity, 1);
        assert_eq!(bill.draft.total, Decimal::from_str("361.90").unwrap());
    }

    #[tokio::test]
    async fn blank_unit_price_falls_back_to_catalog_price() {
        let c = catalog().await;
        for price in [json!(null), json!(""), json!("  ")] {
            let items = vec![json!({ "service_id": c.hosting_id, "unit_price": price })];
            let draft = assemble_items(&c.store, &items).await.unwrap();
            assert_eq!(draft.total, Decimal::from_str("9.99").unwrap());
        }
    }

    #[tokio::test]
    async fn legacy_single_item_shorthand_is_accepted() {
        let c = catalog().await;
        let body = json!({
            "customer_id": c.customer_id,
            "service_id": c.consulting_id,
            "quantity": 2
        });

        let bill = assemble(&c.store, &body).await.unwrap();
        assert_eq!(bill.draft.lines.len(), 1);
        assert_eq!(bill.draft.total, Decimal::from_str("241.00").unwrap());
    }

    #[tokio::test]
    async fn customer_checks_come_first() {
        let c = catalog().await;

        let err = assemble(&c.store, &json!({ "items": [] })).await.unwrap_err();
        assert_eq!(message(err), "Customer is required");

        let err = assemble(&c.store, &json!({ "customer_id": " " })).await.unwrap_err();
        assert_eq!(message(err), "Customer is required");

        let err = assemble(&c.store, &json!({ "customer_id": 404, "items": [] }))
            .await
            .unwrap_err();
        assert!(matches!(err, BillError::NotFound(ref m) if m == "Customer not found"));

        let err = assemble(&c.store, &json!({ "customer_id": "abc" }))
            .await
            .unwrap_err();
        assert!(matches!(err, BillError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn empty_item_list_is_rejected() {
        let c = catalog().await;
        let err = assemble(&c.store, &json!({ "customer_id": c.customer_id, "items": [] }))
            .await
            .unwrap_err();
        assert_eq!(message(err), "At least one service item is required");

        let err = assemble(&c.store, &json!({ "customer_id": c.customer_id, "items": "x" }))
            .await
            .unwrap_err();
        assert_eq!(message(err), "Items must be a non-empty list");
    }

    #[test]
    fn update_shorthand_only_applies_without_an_items_key() {
        let body = json!({ "items": [], "service_id": 3 });
        assert_eq!(replacement_items(&body).unwrap(), Some(vec![]));
        assert_eq!(requested_items(&body).unwrap().map(|i| i.len()), Some(1));

        let body = json!({ "items": null, "service_id": 3 });
        let items = replacement_items(&body).unwrap().unwrap();
        assert_eq!(items[0]["service_id"], json!(3));
        assert_eq!(items[0]["quantity"], json!(1));

        assert_eq!(replacement_items(&json!({ "date": "2025-01-01" })).unwrap(), None);
    }

    #[tokio::test]
    async fn negative_and_negative_zero_prices() {
        let c = catalog().await;
        let items = vec![json!({ "service_id": c.hosting_id, "unit_price": "-0.00" })];
        let draft = assemble_items(&c.store, &items).await.unwrap();
        assert!(draft.total.is_zero());

        let items = vec![json!({ "service_id": c.hosting_id, "unit_price": "-0.01" })];
        let err = assemble_items(&c.store, &items).await.unwrap_err();
        assert_eq!(message(err), "Item 1: unit_price must be >= 0");
    }

    #[tokio::test]
    async fn item_errors_name_the_item() {
        let c = catalog().await;
        let cases = [
            (json!({ "quantity": 1 }), "Item 2: service_id is required"),
            (json!({ "service_id": "" }), "Item 2: service_id is required"),
            (
                json!({ "service_id": c.hosting_id, "quantity": 0 }),
                "Item 2: quantity must be >= 1",
            ),
            (
                json!({ "service_id": c.hosting_id, "quantity": 1.5 }),
                "Item 2: quantity must be an integer",
            ),
            (
                json!({ "service_id": c.hosting_id, "unit_price": -1 }),
                "Item 2: unit_price must be >= 0",
            ),
            (
                json!({ "service_id": c.hosting_id, "unit_price": "free" }),
                "Item 2: unit_price must be a number",
            ),
        ];

        for (bad, expected) in cases {
            let items = vec![json!({ "service_id": c.consulting_id }), bad];
            let err = assemble_items(&c.store, &items).await.unwrap_err();
            assert!(matches!(err, BillError::InvalidInput(_)), "{}", expected);
            assert_eq!(message(err), expected);
        }
    }

    #[tokio::test]
    async fn unknown_or_deleted_service_is_not_found() {
        let c = catalog().await;
        let items = vec![json!({ "service_id": 77 })];
        let err = assemble_items(&c.store, &items).await.unwrap_err();
        assert!(matches!(err, BillError::NotFound(ref m) if m == "Service not found (id: 77)"));

        c.store.delete_service(c.hosting_id).await.unwrap();
        let items = vec![json!({ "service_id": c.hosting_id })];
        let err = assemble_items(&c.store, &items).await.unwrap_err();
        assert!(matches!(err, BillError::NotFound(_)));
    }

    #[test]
    fn integral_values_parse_from_numbers_and_strings() {
        assert_eq!(parse_int(&json!(3)), Some(3));
        assert_eq!(parse_int(&json!(3.0)), Some(3));
        assert_eq!(parse_int(&json!(" 12 ")), Some(12));
        assert_eq!(parse_int(&json!(2.5)), None);
        assert_eq!(parse_int(&json!(true)), None);
        assert_eq!(parse_decimal(&json!("1e2")), Some(Decimal::from(100)));
        assert_eq!(parse_decimal(&json!([])), None);
    }
}
