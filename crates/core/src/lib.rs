//! Shopkeep Core - Shared domain types.
//!
//! This crate provides the types used across all Shopkeep components:
//! - `api` - JSON REST API serving the catalog, the cart and the tool layer
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Cart pricing aggregation lives here because it is a
//! pure function of cart lines and products.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, quantities, prices, products and cart views

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
