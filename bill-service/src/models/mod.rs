//! Domain models for bill-service.

mod bill;
mod customer;
mod service;

pub use bill::{Bill, BillChanges, BillDraft, BillItem, BillLine, NewBill};
pub use customer::{CreateCustomer, Customer, UpdateCustomer};
pub use service::{CreateService, Service, UpdateService};
