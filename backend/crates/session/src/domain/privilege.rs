//! Privilege Resolution
//!
//! The privileged (administrator) flag comes from the durable user record.
//! [`BootstrapAdmin`] is the single exception: it marks the email whose
//! record is created as an administrator, so the very first admin can exist.
//! It never elevates an existing record.

use crate::domain::entity::{principal::Principal, user_record::UserRecord};
use crate::domain::value_object::email::Email;

/// Privileged flag for a resolved record
#[inline]
pub fn is_privileged(record: &UserRecord) -> bool {
    record.is_admin
}

/// Seed for the first administrator account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    email: Email,
}

impl BootstrapAdmin {
    pub fn new(email: Email) -> Self {
        Self { email }
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Whether a record created for `principal` should start as admin
    pub fn seeds(&self, principal: &Principal) -> bool {
        principal.email.as_ref() == Some(&self.email)
    }
}
