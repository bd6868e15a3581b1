pub mod bills;
pub mod customers;
pub mod health;
pub mod reports;
pub mod services;
