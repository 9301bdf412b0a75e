//! Business logic services.
//!
//! # Services
//!
//! - `catalog` - Product lookups (cached) and seeding
//! - `cart` - Cart consolidation, quantity rules and pricing
//! - `chat` - Client for the external chat service

pub mod cart;
pub mod catalog;
pub mod chat;

pub use cart::{CartError, CartService, RetryPolicy};
pub use catalog::{CatalogService, SeedError, SeedFile, SeedReport};
pub use chat::{ChatClient, ChatError};
