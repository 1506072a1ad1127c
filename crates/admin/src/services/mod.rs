//! Business logic services for the back-office.
//!
//! - `auth` - password login for admin accounts

pub mod auth;

pub use auth::{AdminAuthError, AdminAuthService};
