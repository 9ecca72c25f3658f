//! Ports
//!
//! Interfaces to the identity provider and the durable user-record store.
//! Implementations live in the infrastructure layer.

use crate::domain::entity::{
    session::Session,
    user_record::{UserRecord, UserRecordPatch},
};
use crate::domain::subscription::Subscription;
use crate::domain::value_object::{principal_id::PrincipalId, user_id::UserId};
use crate::error::SessionResult;

/// Profile data supplied at sign-up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpProfile {
    pub display_name: String,
}

impl SignUpProfile {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}

/// Remote identity provider
#[trait_variant::make(IdentityProvider: Send)]
pub trait LocalIdentityProvider {
    /// Current session, if any
    async fn get_session(&self) -> SessionResult<Option<Session>>;

    /// Subscribe to session-change events
    fn subscribe(&self) -> Subscription;

    /// Rotate tokens for the current session
    async fn refresh_session(&self) -> SessionResult<Session>;

    /// Sign in with email and secret
    async fn sign_in_with_credentials(&self, email: &str, secret: &str)
    -> SessionResult<Session>;

    /// Create an account. `None` when the provider requires confirmation
    /// before issuing a session.
    async fn sign_up(
        &self,
        email: &str,
        secret: &str,
        profile: &SignUpProfile,
    ) -> SessionResult<Option<Session>>;

    /// End the current session
    async fn sign_out(&self) -> SessionResult<()>;
}

/// Durable user-record store
#[trait_variant::make(UserRecordStore: Send)]
pub trait LocalUserRecordStore {
    /// Find the record belonging to a principal
    async fn find_by_principal(&self, principal_id: &PrincipalId)
    -> SessionResult<Option<UserRecord>>;

    /// Insert a new record, returning the stored row
    async fn insert(&self, record: &UserRecord) -> SessionResult<UserRecord>;

    /// Apply a partial update, returning the stored row
    async fn update(&self, user_id: &UserId, patch: &UserRecordPatch)
    -> SessionResult<UserRecord>;
}
