//! Principal Entity
//!
//! The raw authenticated subject returned by the identity provider, before
//! it is resolved against the user-record store.

use crate::domain::value_object::{email::Email, principal_id::PrincipalId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// Provider-issued subject ID
    pub id: PrincipalId,
    /// Contact email, when the provider knows one
    pub email: Option<Email>,
    /// Display name from provider metadata (e.g. set at sign-up)
    pub display_name: Option<String>,
}

impl Principal {
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            email: None,
            display_name: None,
        }
    }

    pub fn with_email(mut self, email: Email) -> Self {
        self.email = Some(email);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Best display name available without a user record.
    ///
    /// Order: metadata name, email local part, principal ID.
    pub fn fallback_display_name(&self) -> String {
        if let Some(name) = self
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
        {
            return name.to_string();
        }

        match &self.email {
            Some(email) => email.local_part().to_string(),
            None => self.id.to_string(),
        }
    }
}
