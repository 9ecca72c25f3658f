//! Session Lifecycle Module
//!
//! Layered structure:
//! - `domain/` - Entities, value objects, events, provider and store ports
//! - `application/` - Lifecycle components and the manager façade
//! - `infra/` - In-memory provider and user-record store
//!
//! ## Features
//! - Single-flight startup with a hard timeout and cached-identity fallback
//! - Ordered handling of provider session-change events
//! - Background token refresh shortly before expiry, forced sign-out on failure
//! - Privileged flag resolved from the durable user record
//! - Session resync when the application returns to the foreground
//!
//! ## Degraded Mode
//! - The last resolved identity is cached through a `KeyValueStore`
//! - User-record failures yield a transient, unprivileged identity
//! - Public entry points never fail; they return an [`ActionOutcome`]

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;

// Re-exports for convenience
pub use application::config::SessionConfig;
pub use application::manager::SessionLifecycleManager;
pub use application::outcome::ActionOutcome;
pub use application::state::ManagerState;
pub use application::visibility::Visibility;
pub use error::{SessionError, SessionResult};
pub use infra::memory::{InMemoryIdentityProvider, InMemoryUserRecordStore};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
}

#[cfg(test)]
mod tests;
