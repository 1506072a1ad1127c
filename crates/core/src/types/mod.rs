//! Core types for Loomwear.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod handle;
pub mod id;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use handle::{Handle, HandleError};
pub use id::*;
pub use price::{CurrencyCode, Money};
pub use status::*;
