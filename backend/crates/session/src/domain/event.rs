//! Auth Events
//!
//! Session-change notifications emitted by the identity provider.

use crate::domain::entity::session::Session;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// A principal signed in (credentials, sign-up, or restored session)
    SignedIn(Session),
    /// The session ended
    SignedOut,
    /// Tokens were rotated for the same principal
    TokenRefreshed(Session),
    /// Principal metadata changed
    UserUpdated(Session),
}

impl AuthEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            AuthEvent::SignedIn(_) => "SIGNED_IN",
            AuthEvent::SignedOut => "SIGNED_OUT",
            AuthEvent::TokenRefreshed(_) => "TOKEN_REFRESHED",
            AuthEvent::UserUpdated(_) => "USER_UPDATED",
        }
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthEvent::SignedIn(s) | AuthEvent::TokenRefreshed(s) | AuthEvent::UserUpdated(s) => {
                Some(s)
            }
            AuthEvent::SignedOut => None,
        }
    }
}
