//! Domain models for the back-office.

pub mod admin_user;
pub mod customer;
pub mod session;

pub use admin_user::{AdminRole, AdminUser};
pub use customer::Customer;
pub use session::{CurrentAdmin, keys as session_keys};
