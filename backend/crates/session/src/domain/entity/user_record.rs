//! User Record Entity
//!
//! Row of the durable user-record store. The only source of truth for the
//! privileged flag.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{email::Email, principal_id::PrincipalId, user_id::UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: UserId,
    /// Provider principal this record belongs to (unique)
    pub principal_id: PrincipalId,
    pub display_name: String,
    pub email: Option<Email>,
    /// Administrator flag
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn new(
        principal_id: PrincipalId,
        display_name: impl Into<String>,
        email: Option<Email>,
        is_admin: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: UserId::new(),
            principal_id,
            display_name: display_name.into(),
            email,
            is_admin,
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a partial update; bumps `updated_at` only when something changed
    pub fn apply(&mut self, patch: &UserRecordPatch) {
        let mut changed = false;

        if let Some(name) = &patch.display_name {
            changed |= self.display_name != *name;
            self.display_name = name.clone();
        }
        if let Some(email) = &patch.email {
            changed |= self.email.as_ref() != Some(email);
            self.email = Some(email.clone());
        }
        if let Some(is_admin) = patch.is_admin {
            changed |= self.is_admin != is_admin;
            self.is_admin = is_admin;
        }

        if changed {
            self.updated_at = Utc::now();
        }
    }
}

/// Partial update for [`UserRecord`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecordPatch {
    pub display_name: Option<String>,
    pub email: Option<Email>,
    pub is_admin: Option<bool>,
}

impl UserRecordPatch {
    pub fn email(email: Email) -> Self {
        Self {
            email: Some(email),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.email.is_none() && self.is_admin.is_none()
    }
}
