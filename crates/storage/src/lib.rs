//! Storage abstraction and implementations for the DBR scheduler.
//!
//! This crate provides the trait-based storage interface the scheduling core
//! talks to, with a JSON-file backend and a transactional in-memory backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{Storage, StorageError, Result};
pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;
