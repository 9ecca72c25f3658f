//! Infrastructure Layer
//!
//! In-process implementations of the identity provider and user-record
//! store ports.

pub mod memory;

pub use memory::{InMemoryIdentityProvider, InMemoryUserRecordStore};
