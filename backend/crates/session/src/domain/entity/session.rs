//! Session Entity
//!
//! Token bundle issued by the identity provider. Owned by the provider; the
//! manager only reads it to resolve an identity and schedule a refresh.

use chrono::{DateTime, Duration, Utc};

use crate::domain::entity::principal::Principal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Authenticated subject
    pub principal: Principal,
    /// Opaque access token
    pub access_token: String,
    /// Refresh capability, absent for non-refreshable sessions
    pub refresh_token: Option<String>,
    /// Absolute expiry
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        principal: Principal,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            principal,
            access_token: access_token.into(),
            refresh_token,
            expires_at,
        }
    }

    /// Time left before expiry, negative once expired
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }

    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }
}
