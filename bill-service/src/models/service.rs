//! Catalog service model for bill-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// A billable service in the catalog.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Service {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone)]
pub struct CreateService {
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateService {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
}
