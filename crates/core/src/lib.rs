//! Loomwear Core - Shared domain types and state machines.
//!
//! This crate provides the types used across all Loomwear components:
//! - `storefront` - Public-facing shop
//! - `admin` - Internal back-office (catalog, customers, orders)
//! - `cli` - Migrations, seeding and admin user management
//!
//! # Architecture
//!
//! The core crate contains types, traits and pure state transitions only.
//! No I/O, no database access, no HTTP. Everything that decides *what* the
//! cart or an order should look like lives here so both binaries agree.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, handles, money and statuses
//! - [`catalog`] - Products, variants (color × size × image), outfits
//! - [`cart`] - The cart state machine shared by guest and customer carts
//! - [`payment`] - Card validation and the simulated payment processor
//! - [`order`] - Orders and their line snapshots

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod catalog;
pub mod order;
pub mod payment;
pub mod types;

pub use types::*;
