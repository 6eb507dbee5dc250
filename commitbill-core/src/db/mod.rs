//! Saved invoice storage
//!
//! SQLite-backed store with:
//! - Schema migrations
//! - Save / list / load / mark-sent operations

pub mod repo;
pub mod schema;

pub use repo::InvoiceStore;
