//! Domain models for the storefront.

pub mod customer;
pub mod session;

pub use customer::Customer;
pub use session::{CurrentCustomer, keys as session_keys};
