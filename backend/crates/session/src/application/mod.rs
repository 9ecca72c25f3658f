//! Application Layer
//!
//! Lifecycle components and the manager façade.

pub mod cache;
pub mod config;
pub mod initializer;
pub mod listener;
pub mod manager;
pub mod outcome;
pub mod resolver;
pub mod scheduler;
pub mod state;
pub mod visibility;

// Re-exports
pub use cache::IdentityCache;
pub use config::{RetryPolicy, SessionConfig};
pub use initializer::SessionInitializer;
pub use listener::{AuthEventListener, ListenerCommand};
pub use manager::SessionLifecycleManager;
pub use outcome::ActionOutcome;
pub use resolver::IdentityResolver;
pub use scheduler::TokenRefreshScheduler;
pub use state::{ManagerState, SessionState};
pub use visibility::{Visibility, VisibilityResync};
