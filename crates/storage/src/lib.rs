//! Summary store abstraction and implementations for qcflow.
//!
//! This crate provides the keyed store that run records live in, with a JSON
//! file backend, an in-memory backend, and an optional SQLite backend.

#![warn(missing_docs)]

pub mod trait_;
#[cfg(feature = "json")]
pub mod json_storage;
pub mod memory_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;

pub use trait_::{Result, StoreError, SummaryStore};
#[cfg(feature = "json")]
pub use json_storage::JsonStore;
pub use memory_storage::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStore;
