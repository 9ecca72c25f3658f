//! Identity Entity
//!
//! The domain-level view of the signed-in user handed to consumers and kept
//! in the persistent cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{principal::Principal, user_record::UserRecord};
use crate::domain::value_object::{email::Email, principal_id::PrincipalId, user_id::UserId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider principal ID
    pub id: PrincipalId,
    /// Backing user record, `None` for a transient identity
    pub user_id: Option<UserId>,
    pub display_name: String,
    pub email: Option<Email>,
    /// Administrator flag, taken from the user record only
    pub privileged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    pub fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.principal_id.clone(),
            user_id: Some(record.user_id),
            display_name: record.display_name.clone(),
            email: record.email.clone(),
            privileged: record.is_admin,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Unpersisted identity used when no user record could be read or written.
    /// Never privileged.
    pub fn transient(principal: &Principal) -> Self {
        let now = Utc::now();
        Self {
            id: principal.id.clone(),
            user_id: None,
            display_name: principal.fallback_display_name(),
            email: principal.email.clone(),
            privileged: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.user_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record_keeps_admin_flag() {
        let record = UserRecord::new(PrincipalId::new("sub-1").unwrap(), "Jane", None, true);
        let identity = Identity::from_record(&record);
        assert!(identity.privileged);
        assert!(identity.is_persisted());
        assert_eq!(identity.user_id, Some(record.user_id));
    }

    #[test]
    fn test_transient_is_never_privileged() {
        let principal = Principal::new(PrincipalId::new("sub-1").unwrap())
            .with_email(Email::new("jane@example.com").unwrap());
        let identity = Identity::transient(&principal);
        assert!(!identity.privileged);
        assert!(!identity.is_persisted());
        assert_eq!(identity.display_name, "jane");
    }

    #[test]
    fn test_cache_json_shape() {
        let record = UserRecord::new(PrincipalId::new("sub-1").unwrap(), "Jane", None, false);
        let json = serde_json::to_string(&Identity::from_record(&record)).unwrap();
        assert!(json.contains("\"displayName\":\"Jane\""));
        assert!(json.contains("\"userId\""));
        assert!(json.contains("\"privileged\":false"));
    }
}
