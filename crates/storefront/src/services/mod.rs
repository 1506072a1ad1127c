//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - customer registration and password login
//! - `cart` - guest and customer carts over one state machine
//! - `catalog` - cached catalog reads
//! - `checkout` - order placement and payment settlement

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;

pub use auth::{AuthError, AuthService};
pub use cart::{CartContents, CartOwner, CartService, CartServiceError};
pub use catalog::{CatalogService, Facets, OutfitDetail};
pub use checkout::{CheckoutError, CheckoutService};
