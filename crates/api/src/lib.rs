//! Shopkeep API library.
//!
//! This crate provides the catalog, cart, tool and chat endpoints as a
//! library, allowing them to be tested end to end and reused by the CLI.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod redact;
pub mod routes;
pub mod services;
pub mod state;
pub mod tools;
