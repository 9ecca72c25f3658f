//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations with no session knowledge:
//! - Retry policy for fallible async operations
//! - Synchronous durable key/value storage (file-backed and in-memory)

pub mod retry;
pub mod storage;

pub use retry::RetryPolicy;
pub use storage::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, StorageError};
