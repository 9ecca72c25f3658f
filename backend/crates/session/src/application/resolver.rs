//! Identity Resolver
//!
//! Maps a provider principal to a domain [`Identity`] through the durable
//! user-record store. Never fails: when the record cannot be read or
//! created, a transient identity is returned so sign-in is never blocked.

use std::sync::Arc;

use platform::retry::RetryPolicy;

use crate::domain::entity::{
    identity::Identity,
    principal::Principal,
    user_record::{UserRecord, UserRecordPatch},
};
use crate::domain::privilege::{self, BootstrapAdmin};
use crate::domain::repository::UserRecordStore;
use crate::error::SessionError;

pub struct IdentityResolver<S>
where
    S: UserRecordStore + Send + Sync + 'static,
{
    store: Arc<S>,
    retry: RetryPolicy,
    bootstrap_admin: Option<BootstrapAdmin>,
}

impl<S> IdentityResolver<S>
where
    S: UserRecordStore + Send + Sync + 'static,
{
    pub fn new(store: Arc<S>, retry: RetryPolicy, bootstrap_admin: Option<BootstrapAdmin>) -> Self {
        Self {
            store,
            retry,
            bootstrap_admin,
        }
    }

    pub async fn resolve(&self, principal: &Principal) -> Identity {
        match self.store.find_by_principal(&principal.id).await {
            Ok(Some(record)) => {
                let record = self.reconcile(record, principal).await;
                let mut identity = Identity::from_record(&record);
                identity.privileged = privilege::is_privileged(&record);
                identity
            }
            Ok(None) => self.create(principal).await,
            Err(e) => {
                // Lookup failed: don't try to create, the record may exist.
                e.log();
                tracing::warn!(
                    principal = %principal.id,
                    "User record unavailable, using transient identity"
                );
                Identity::transient(principal)
            }
        }
    }

    /// Create the missing record, retrying per policy
    async fn create(&self, principal: &Principal) -> Identity {
        let seed_admin = self
            .bootstrap_admin
            .as_ref()
            .is_some_and(|admin| admin.seeds(principal));

        let record = UserRecord::new(
            principal.id.clone(),
            principal.fallback_display_name(),
            principal.email.clone(),
            seed_admin,
        );

        match self
            .retry
            .run_if(
                "insert user record",
                |_| self.store.insert(&record),
                |e: &SessionError| e.kind().is_transient(),
            )
            .await
        {
            Ok(stored) => {
                tracing::info!(
                    principal = %principal.id,
                    user_id = %stored.user_id,
                    privileged = stored.is_admin,
                    "Created user record"
                );
                if seed_admin {
                    tracing::warn!(
                        principal = %principal.id,
                        "Bootstrap administrator seeded"
                    );
                }
                Identity::from_record(&stored)
            }
            Err(e) => {
                e.log();
                tracing::warn!(
                    principal = %principal.id,
                    attempts = self.retry.attempts(),
                    "User record creation failed, using transient identity"
                );
                Identity::transient(principal)
            }
        }
    }

    /// Best-effort sync of the record's email with the provider's
    async fn reconcile(&self, record: UserRecord, principal: &Principal) -> UserRecord {
        let Some(email) = principal.email.as_ref() else {
            return record;
        };
        if record.email.as_ref() == Some(email) {
            return record;
        }

        let patch = UserRecordPatch::email(email.clone());
        match self.store.update(&record.user_id, &patch).await {
            Ok(updated) => {
                tracing::debug!(principal = %principal.id, "User record email updated");
                updated
            }
            Err(e) => {
                e.log();
                record
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_object::{email::Email, principal_id::PrincipalId};
    use crate::infra::memory::InMemoryUserRecordStore;
    use std::time::Duration;

    fn principal(id: &str, email: &str) -> Principal {
        Principal::new(PrincipalId::new(id).unwrap()).with_email(Email::new(email).unwrap())
    }

    fn resolver(
        store: &Arc<InMemoryUserRecordStore>,
        admin: Option<&str>,
    ) -> IdentityResolver<InMemoryUserRecordStore> {
        IdentityResolver::new(
            Arc::clone(store),
            RetryPolicy::new(3, Duration::from_millis(250)),
            admin.map(|e| BootstrapAdmin::new(Email::new(e).unwrap())),
        )
    }

    #[tokio::test]
    async fn test_hit_preserves_stored_flag() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        let p = principal("sub-1", "jane@example.com");
        store.put(UserRecord::new(
            p.id.clone(),
            "Captain Jane",
            p.email.clone(),
            true,
        ));

        let identity = resolver(&store, None).resolve(&p).await;
        assert_eq!(identity.display_name, "Captain Jane");
        assert!(identity.privileged);
        assert_eq!(store.insert_attempts(), 0);
    }

    #[tokio::test]
    async fn test_miss_creates_unprivileged_record() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        let p = principal("sub-1", "jane@example.com");

        let identity = resolver(&store, None).resolve(&p).await;
        assert!(identity.is_persisted());
        assert!(!identity.privileged);
        assert_eq!(identity.display_name, "jane");
        assert!(store.get(&p.id).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_failures_then_persisted() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        store.fail_next_inserts(2);
        let p = principal("sub-1", "jane@example.com");

        let identity = resolver(&store, None).resolve(&p).await;
        assert!(identity.is_persisted());
        assert_eq!(store.insert_attempts(), 3);
        assert_eq!(store.get(&p.id).map(|r| r.user_id), identity.user_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_failures_yield_transient_identity() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        store.fail_next_inserts(3);
        let p = principal("sub-1", "jane@example.com");

        let identity = resolver(&store, None).resolve(&p).await;
        assert!(!identity.is_persisted());
        assert!(!identity.privileged);
        assert_eq!(store.insert_attempts(), 3);
        assert!(store.get(&p.id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_conflicting_insert_is_not_retried() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        let p = principal("sub-1", "jane@example.com");
        store.set_lookup_latency(&p.id, Duration::from_secs(1));
        let resolver = resolver(&store, None);

        // Another device creates the record while the lookup is in flight
        let (identity, _) = tokio::join!(resolver.resolve(&p), async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            store.put(UserRecord::new(p.id.clone(), "Jane", p.email.clone(), false));
        });

        assert!(!identity.is_persisted());
        assert_eq!(store.insert_attempts(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_yields_transient_without_insert() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        store.set_fail_lookups(true);
        let p = principal("sub-1", "jane@example.com");

        let identity = resolver(&store, None).resolve(&p).await;
        assert!(!identity.is_persisted());
        assert_eq!(store.insert_attempts(), 0);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_seeds_new_record_only() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        let root = principal("sub-root", "root@example.com");
        let jane = principal("sub-jane", "jane@example.com");
        let resolver = resolver(&store, Some("root@example.com"));

        assert!(resolver.resolve(&root).await.privileged);
        assert!(store.get(&root.id).is_some_and(|r| r.is_admin));
        assert!(!resolver.resolve(&jane).await.privileged);
    }

    #[tokio::test]
    async fn test_bootstrap_does_not_elevate_existing_record() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        let root = principal("sub-root", "root@example.com");
        store.put(UserRecord::new(root.id.clone(), "root", root.email.clone(), false));

        let identity = resolver(&store, Some("root@example.com")).resolve(&root).await;
        assert!(!identity.privileged);
    }

    #[tokio::test]
    async fn test_hit_reconciles_changed_email() {
        let store = Arc::new(InMemoryUserRecordStore::new());
        let p = principal("sub-1", "new@example.com");
        store.put(UserRecord::new(
            p.id.clone(),
            "Jane",
            Some(Email::new("old@example.com").unwrap()),
            false,
        ));

        let identity = resolver(&store, None).resolve(&p).await;
        assert_eq!(identity.email, p.email);
        assert_eq!(store.get(&p.id).and_then(|r| r.email), p.email);
    }
}
