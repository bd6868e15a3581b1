//! Storage seam shared by the PostgreSQL and in-process backends.

use crate::models::{
    Bill, BillChanges, CreateCustomer, CreateService, Customer, NewBill, Service, UpdateCustomer,
    UpdateService,
};
use async_trait::async_trait;
use thiserror::Error;

/// Name of the unique constraint guarding `bills.bill_number`.
pub const BILL_NUMBER_CONSTRAINT: &str = "bills_bill_number_key";

/// Storage failure, classified so callers never inspect driver message text.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{message}")]
    UniqueViolation {
        constraint: Option<String>,
        message: String,
    },

    #[error("{message}")]
    ForeignKeyViolation {
        constraint: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Database(sqlx::Error),

    #[error("{0}")]
    Backend(String),
}

impl StoreError {
    /// True when this is a unique violation on exactly `constraint`.
    pub fn is_unique_violation_of(&self, constraint: &str) -> bool {
        matches!(
            self,
            StoreError::UniqueViolation { constraint: Some(c), .. } if c == constraint
        )
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            let constraint = db_err.constraint().map(str::to_owned);
            let message = db_err.message().to_owned();
            if db_err.is_unique_violation() {
                return StoreError::UniqueViolation {
                    constraint,
                    message,
                };
            }
            if db_err.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation {
                    constraint,
                    message,
                };
            }
        }
        StoreError::Database(err)
    }
}

/// Relational store holding customers, services and bills.
///
/// Default reads (`list_*`, `get_*`) never return soft-deleted rows. Every
/// bill write is atomic: either the header and all of its items land, or
/// nothing does.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    // Customers
    async fn list_customers(&self) -> Result<Vec<Customer>, StoreError>;
    async fn get_customer(&self, id: i64) -> Result<Option<Customer>, StoreError>;
    async fn create_customer(&self, input: &CreateCustomer) -> Result<Customer, StoreError>;
    async fn update_customer(
        &self,
        id: i64,
        input: &UpdateCustomer,
    ) -> Result<Option<Customer>, StoreError>;
    async fn delete_customer(&self, id: i64) -> Result<bool, StoreError>;

    // Services
    async fn list_services(&self) -> Result<Vec<Service>, StoreError>;
    async fn get_service(&self, id: i64) -> Result<Option<Service>, StoreError>;
    async fn create_service(&self, input: &CreateService) -> Result<Service, StoreError>;
    async fn update_service(
        &self,
        id: i64,
        input: &UpdateService,
    ) -> Result<Option<Service>, StoreError>;
    async fn delete_service(&self, id: i64) -> Result<bool, StoreError>;

    // Bills
    async fn list_bills(&self) -> Result<Vec<Bill>, StoreError>;
    async fn get_bill(&self, id: i64) -> Result<Option<Bill>, StoreError>;

    /// Greatest `bill_number` starting with `prefix` in byte-wise string
    /// order, soft-deleted bills included.
    async fn max_bill_number_with_prefix(&self, prefix: &str)
        -> Result<Option<String>, StoreError>;

    /// Insert header and items, then set the total, in one transaction.
    async fn insert_bill(&self, bill: &NewBill<'_>) -> Result<Bill, StoreError>;

    /// Apply header changes and optionally replace the item set, in one
    /// transaction. `Ok(None)` when the bill is missing or soft-deleted.
    async fn update_bill(&self, id: i64, changes: &BillChanges)
        -> Result<Option<Bill>, StoreError>;

    async fn toggle_bill_paid(&self, id: i64) -> Result<Option<Bill>, StoreError>;
    async fn delete_bill(&self, id: i64) -> Result<bool, StoreError>;
}
