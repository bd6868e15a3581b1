//! Bill creation and update.
//!
//! Creation allocates the next `INV-YY-NNNN` number and writes the bill in one
//! store transaction. A collision on the bill-number constraint means another
//! writer took the candidate first; the loop moves to the next suffix without
//! re-scanning, up to [`MAX_NUMBERING_ATTEMPTS`] times. Any other failure ends
//! the request immediately.

use crate::models::{Bill, BillChanges, NewBill};
use crate::services::assembler::{
    assemble, assemble_items, is_blank, replacement_items, resolve_customer,
};
use crate::services::error::BillError;
use crate::services::metrics::{BILLS_CREATED_TOTAL, BILL_NUMBER_CONFLICTS_TOTAL, ERRORS_TOTAL};
use crate::services::numbering::{current_max_suffix, format_bill_number};
use crate::services::store::{Store, BILL_NUMBER_CONSTRAINT};
use chrono::{Datelike, Local, NaiveDate};
use serde_json::Value;
use tracing::{info, instrument, warn};

pub const MAX_NUMBERING_ATTEMPTS: u32 = 50;

/// Create a bill from a JSON request body.
#[instrument(skip_all)]
pub async fn create_bill(store: &dyn Store, body: &Value) -> Result<Bill, BillError> {
    let result = try_create_bill(store, body).await;
    if let Err(e) = &result {
        ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
    }
    result
}

async fn try_create_bill(store: &dyn Store, body: &Value) -> Result<Bill, BillError> {
    let assembled = assemble(store, body).await?;
    let date = parse_date(body.get("date"))?.unwrap_or_else(|| Local::now().date_naive());
    let is_paid = parse_paid(body.get("is_paid"))?.unwrap_or(false);

    let year = date.year();
    let mut base_suffix = current_max_suffix(store, year).await?;

    for attempt in 1..=MAX_NUMBERING_ATTEMPTS {
        let Some(candidate) = base_suffix.checked_add(1) else {
            warn!(year, base_suffix, "Bill number suffix space exhausted");
            break;
        };
        let bill_number = format_bill_number(year, candidate);
        let new_bill = NewBill {
            bill_number,
            customer_id: assembled.customer_id,
            date,
            is_paid,
            draft: &assembled.draft,
        };

        match store.insert_bill(&new_bill).await {
            Ok(bill) => {
                BILLS_CREATED_TOTAL.inc();
                info!(
                    bill_id = bill.id,
                    bill_number = %bill.bill_number,
                    total = %bill.total,
                    items = bill.items.len(),
                    "Bill created"
                );
                return Ok(bill);
            }
            Err(e) if e.is_unique_violation_of(BILL_NUMBER_CONSTRAINT) => {
                BILL_NUMBER_CONFLICTS_TOTAL.inc();
                warn!(
                    attempt,
                    bill_number = %new_bill.bill_number,
                    "Bill number already taken, trying the next one"
                );
                base_suffix = candidate;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(BillError::NumberingExhausted)
}

/// Apply a JSON update body to a live bill. The bill number never changes.
#[instrument(skip(store, body))]
pub async fn update_bill(store: &dyn Store, id: i64, body: &Value) -> Result<Bill, BillError> {
    let result = try_update_bill(store, id, body).await;
    if let Err(e) = &result {
        ERRORS_TOTAL.with_label_values(&[e.kind()]).inc();
    }
    result
}

async fn try_update_bill(store: &dyn Store, id: i64, body: &Value) -> Result<Bill, BillError> {
    if store.get_bill(id).await?.is_none() {
        return Err(BillError::not_found("Bill not found"));
    }

    let customer_id = match body.get("customer_id") {
        Some(v) if !is_blank(v) => Some(resolve_customer(store, Some(v)).await?),
        _ => None,
    };
    let date = parse_date(body.get("date"))?;
    let is_paid = parse_paid(body.get("is_paid"))?;

    let draft = match replacement_items(body)? {
        Some(items) if items.is_empty() => {
            return Err(BillError::invalid("Items must be a non-empty list"))
        }
        Some(items) => Some(assemble_items(store, &items).await?),
        None => None,
    };

    let changes = BillChanges {
        customer_id,
        date,
        is_paid,
        draft,
    };

    let bill = store
        .update_bill(id, &changes)
        .await?
        .ok_or_else(|| BillError::not_found("Bill not found"))?;

    info!(bill_id = bill.id, bill_number = %bill.bill_number, "Bill updated");
    Ok(bill)
}

/// `YYYY-MM-DD`; absent, `null` or blank means "not given".
fn parse_date(raw: Option<&Value>) -> Result<Option<NaiveDate>, BillError> {
    match raw {
        None => Ok(None),
        Some(v) if is_blank(v) => Ok(None),
        Some(Value::String(s)) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| BillError::invalid("Invalid date format, expected YYYY-MM-DD")),
        Some(_) => Err(BillError::invalid(
            "Invalid date format, expected YYYY-MM-DD",
        )),
    }
}

fn parse_paid(raw: Option<&Value>) -> Result<Option<bool>, BillError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(BillError::invalid("is_paid must be a boolean")),
    }
}
