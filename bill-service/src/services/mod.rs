pub mod assembler;
pub mod billing;
pub mod database;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod numbering;
pub mod reports;
pub mod store;

pub use database::PgStore;
pub use error::BillError;
pub use memory::MemoryStore;
pub use store::{Store, StoreError};
