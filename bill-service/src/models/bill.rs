//! Bill (invoice) model for bill-service.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// Bill header with its line items.
///
/// `customer_name` and each item's `service_name` are joined in for display
/// and resolve even when the referenced row has been soft-deleted.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Bill {
    pub id: i64,
    pub bill_number: String,
    pub customer_id: i64,
    pub customer_name: Option<String>,
    #[sqlx(skip)]
    pub items: Vec<BillItem>,
    pub total: Decimal,
    pub date: NaiveDate,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}

/// One line on a bill.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BillItem {
    pub id: i64,
    pub bill_id: i64,
    pub service_id: i64,
    pub service_name: Option<String>,
    #[serde(skip_serializing)]
    pub position: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// A validated line, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillLine {
    pub service_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

impl BillLine {
    pub fn new(service_id: i64, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            service_id,
            quantity,
            unit_price,
            line_total: Decimal::from(quantity) * unit_price,
        }
    }
}

/// Validated lines and their total, produced before any write begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillDraft {
    pub lines: Vec<BillLine>,
    pub total: Decimal,
}

impl BillDraft {
    /// Sums line totals in input order.
    pub fn from_lines(lines: Vec<BillLine>) -> Self {
        let total = lines.iter().map(|l| l.line_total).sum();
        Self { lines, total }
    }
}

/// Header and lines for one insert attempt.
#[derive(Debug, Clone)]
pub struct NewBill<'a> {
    pub bill_number: String,
    pub customer_id: i64,
    pub date: NaiveDate,
    pub is_paid: bool,
    pub draft: &'a BillDraft,
}

/// Changes applied to an existing bill in a single transaction.
///
/// When `draft` is set the whole item set is replaced and `total` rewritten.
#[derive(Debug, Clone, Default)]
pub struct BillChanges {
    pub customer_id: Option<i64>,
    pub date: Option<NaiveDate>,
    pub is_paid: Option<bool>,
    pub draft: Option<BillDraft>,
}
