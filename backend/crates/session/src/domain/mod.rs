//! Domain Layer
//!
//! Contains entities, value objects, events, and the ports to the identity
//! provider and the user-record store.

pub mod entity;
pub mod event;
pub mod privilege;
pub mod repository;
pub mod subscription;
pub mod value_object;

// Re-exports
pub use entity::{
    identity::Identity, principal::Principal, session::Session, user_record::UserRecord,
};
pub use event::AuthEvent;
pub use repository::{IdentityProvider, SignUpProfile, UserRecordStore};
pub use subscription::{Notification, Subscription};
