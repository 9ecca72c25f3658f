//! Scenario tests for the session lifecycle manager
//! Drives the façade end to end against the in-memory adapters.

#[cfg(test)]
mod support {
    use std::sync::Arc;
    use std::time::Duration;

    use platform::storage::{KeyValueStore, MemoryKeyValueStore};

    use crate::application::cache::IdentityCache;
    use crate::application::config::SessionConfig;
    use crate::application::manager::SessionLifecycleManager;
    use crate::application::state::ManagerState;
    use crate::domain::entity::{identity::Identity, user_record::UserRecord};
    use crate::domain::value_object::{email::Email, principal_id::PrincipalId};
    use crate::infra::memory::{InMemoryIdentityProvider, InMemoryUserRecordStore};

    pub const CACHE_KEY: &str = "session.identity";

    pub type Manager = SessionLifecycleManager<InMemoryIdentityProvider, InMemoryUserRecordStore>;

    pub struct Harness {
        pub provider: Arc<InMemoryIdentityProvider>,
        pub store: Arc<InMemoryUserRecordStore>,
        pub cache: Arc<MemoryKeyValueStore>,
        pub manager: Manager,
    }

    impl Harness {
        pub fn new(provider: InMemoryIdentityProvider) -> Self {
            Self::with_config(provider, SessionConfig::default())
        }

        pub fn with_config(provider: InMemoryIdentityProvider, config: SessionConfig) -> Self {
            let provider = Arc::new(provider);
            let store = Arc::new(InMemoryUserRecordStore::new());
            let cache = Arc::new(MemoryKeyValueStore::new());
            let manager = SessionLifecycleManager::new(
                Arc::clone(&provider),
                Arc::clone(&store),
                cache.clone(),
                config,
            );
            Self {
                provider,
                store,
                cache,
                manager,
            }
        }

        pub fn identity_cache(&self) -> IdentityCache {
            IdentityCache::new(self.cache.clone(), CACHE_KEY)
        }

        pub fn has_cached_identity(&self) -> bool {
            self.cache.get(CACHE_KEY).ok().flatten().is_some()
        }

        /// Wait (in virtual time) until the manager state satisfies `done`
        pub async fn wait_until(&self, done: impl FnMut(&ManagerState) -> bool) -> ManagerState {
            let mut rx = self.manager.subscribe();
            let state = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(done))
                .await
                .expect("state did not settle")
                .expect("state channel closed");
            (*state).clone()
        }
    }

    pub fn provider_with(accounts: &[(&str, &str)]) -> InMemoryIdentityProvider {
        accounts
            .iter()
            .fold(InMemoryIdentityProvider::default(), |provider, (email, name)| {
                provider
                    .with_account(email, "correct-horse", name)
                    .expect("valid account")
            })
    }

    pub fn cached_identity(name: &str) -> Identity {
        Identity::from_record(&UserRecord::new(
            PrincipalId::new("cached-sub").unwrap(),
            name,
            Some(Email::new("cached@example.com").unwrap()),
            false,
        ))
    }

    pub fn display_name(state: &ManagerState) -> Option<&str> {
        state.identity().map(|i| i.display_name.as_str())
    }
}

#[cfg(test)]
mod initialization_tests {
    use super::support::*;
    use crate::application::config::SessionConfig;
    use crate::domain::repository::IdentityProvider;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_initialize_is_single_flight() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness
            .provider
            .seed_session("jane@example.com", chrono::Duration::hours(1))
            .unwrap();
        let m = &harness.manager;

        let (a, b, c) = tokio::join!(m.initialize(), m.initialize(), m.initialize());
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(harness.provider.get_session_calls(), 1);

        // Later callers get the same outcome without a new query
        assert!(m.initialize().await.is_ok());
        assert_eq!(harness.provider.get_session_calls(), 1);

        let state = m.snapshot();
        assert_eq!(display_name(&state), Some("Jane"));
        assert!(!state.is_loading());
        assert!(state.is_initialized());
    }

    #[tokio::test]
    async fn test_existing_session_is_restored_and_cached() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness
            .provider
            .seed_session("jane@example.com", chrono::Duration::hours(1))
            .unwrap();

        let outcome = harness.manager.start().await;
        assert!(outcome.is_ok());

        let identity = harness.manager.identity().expect("identity restored");
        assert!(identity.is_persisted());
        assert!(!harness.manager.is_privileged());
        assert_eq!(harness.identity_cache().read(), Some(identity));
        assert!(harness.manager.refresh_scheduler().is_armed());
        assert_eq!(harness.store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_provider_falls_back_to_cache() {
        let harness = Harness::new(provider_with(&[]));
        harness.provider.set_stall_sessions(true);
        let cached = cached_identity("Cached Jane");
        harness.identity_cache().write(&cached);

        let started = tokio::time::Instant::now();
        let outcome = harness.manager.start().await;

        assert!(started.elapsed() <= Duration::from_secs(3));
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("The sign-in service took too long to respond.")
        );

        let state = harness.manager.snapshot();
        assert!(!state.is_loading());
        assert!(state.is_initialized());
        assert_eq!(state.identity(), Some(&cached));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_provider_without_cache_settles_signed_out() {
        let harness = Harness::new(provider_with(&[]));
        harness.provider.set_stall_sessions(true);

        harness.manager.start().await;

        let state = harness.manager.snapshot();
        assert!(!state.is_loading());
        assert!(state.identity().is_none());
        assert!(!state.is_privileged());
    }

    #[tokio::test]
    async fn test_provider_error_uses_cached_identity() {
        let harness = Harness::new(provider_with(&[]));
        harness.provider.set_fail_sessions(true);
        let cached = cached_identity("Offline Jane");
        harness.identity_cache().write(&cached);

        let outcome = harness.manager.initialize().await;

        assert!(outcome.is_ok());
        assert_eq!(harness.manager.identity(), Some(cached));
        assert!(!harness.manager.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_safety_timeout_forces_initialized() {
        let config = SessionConfig::default().with_init_timeout(Duration::from_secs(10));
        let harness = Harness::with_config(provider_with(&[]), config);
        harness.provider.set_stall_sessions(true);

        let (outcome, midway) = tokio::join!(harness.manager.start(), async {
            tokio::time::sleep(Duration::from_millis(5_500)).await;
            harness.manager.snapshot()
        });

        assert!(midway.is_initialized());
        assert!(!midway.is_loading());
        assert!(midway.identity().is_none());
        assert!(!outcome.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_alone_arms_safety_timeout() {
        let config = SessionConfig::default().with_init_timeout(Duration::from_secs(10));
        let harness = Harness::with_config(provider_with(&[]), config);
        harness.provider.set_stall_sessions(true);

        let (_, midway) = tokio::join!(harness.manager.initialize(), async {
            tokio::time::sleep(Duration::from_millis(5_500)).await;
            harness.manager.snapshot()
        });

        assert!(midway.is_initialized());
        assert!(!midway.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_out_during_restore_is_kept() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness
            .provider
            .seed_session("a@example.com", chrono::Duration::hours(1))
            .unwrap();
        let alice = harness.provider.principal("a@example.com").unwrap();
        harness
            .store
            .set_lookup_latency(&alice.id, Duration::from_secs(2));

        let (outcome, logout) = tokio::join!(harness.manager.start(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            harness.manager.logout().await
        });
        assert!(outcome.is_ok());
        assert!(logout.is_ok());

        // The restore finished after the sign-out and must not revive Alice
        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = harness.manager.snapshot();
        assert!(state.identity().is_none());
        assert!(state.is_initialized());
        assert!(!state.is_loading());
        assert!(!harness.has_cached_identity());
        assert!(!harness.manager.refresh_scheduler().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sign_in_elsewhere_during_restore_is_kept() {
        let harness = Harness::new(provider_with(&[
            ("a@example.com", "Alice"),
            ("b@example.com", "Bob"),
        ]));
        harness
            .provider
            .seed_session("a@example.com", chrono::Duration::hours(1))
            .unwrap();
        let alice = harness.provider.principal("a@example.com").unwrap();
        harness
            .store
            .set_lookup_latency(&alice.id, Duration::from_secs(2));

        // Bob signs in from another tab while Alice's record is still loading
        let (outcome, _) = tokio::join!(harness.manager.start(), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            harness
                .provider
                .sign_in_with_credentials("b@example.com", "correct-horse")
                .await
                .unwrap()
        });
        assert!(outcome.is_ok());

        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = harness.manager.snapshot();
        assert_eq!(display_name(&state), Some("Bob"));
        assert!(!state.is_loading());
        assert_eq!(
            harness.identity_cache().read().map(|i| i.display_name),
            Some("Bob".to_string())
        );
        assert!(harness.manager.refresh_scheduler().is_armed());
    }
}

#[cfg(test)]
mod event_tests {
    use super::support::*;
    use crate::domain::event::AuthEvent;
    use crate::domain::repository::IdentityProvider;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_events_apply_in_emission_order() {
        let harness = Harness::new(provider_with(&[
            ("a@example.com", "Alice"),
            ("b@example.com", "Bob"),
        ]));
        harness.manager.initialize().await;

        // The first resolution is the slowest one
        let alice = harness.provider.principal("a@example.com").unwrap();
        harness
            .store
            .set_lookup_latency(&alice.id, Duration::from_secs(2));

        let session_a = harness
            .provider
            .seed_session("a@example.com", chrono::Duration::hours(1))
            .unwrap();
        let session_b = harness
            .provider
            .seed_session("b@example.com", chrono::Duration::hours(1))
            .unwrap();

        harness.provider.emit(AuthEvent::SignedIn(session_a));
        harness.provider.emit(AuthEvent::SignedOut);
        harness.provider.emit(AuthEvent::SignedIn(session_b));

        let state = harness
            .wait_until(|s| display_name(s) == Some("Bob") && !s.is_loading())
            .await;
        assert!(state.is_initialized());

        // Nothing from the earlier events arrives late
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(display_name(&harness.manager.snapshot()), Some("Bob"));
        assert_eq!(harness.store.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_mid_resolution_discards_result() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness.manager.initialize().await;

        let alice = harness.provider.principal("a@example.com").unwrap();
        harness
            .store
            .set_lookup_latency(&alice.id, Duration::from_secs(3));
        let session = harness
            .provider
            .seed_session("a@example.com", chrono::Duration::hours(1))
            .unwrap();
        harness.provider.emit(AuthEvent::SignedIn(session.clone()));

        harness.wait_until(|s| s.is_loading()).await;
        harness.manager.dispose().await;
        let frozen = harness.manager.snapshot();

        tokio::time::sleep(Duration::from_secs(10)).await;
        harness.provider.emit(AuthEvent::SignedIn(session));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(harness.manager.snapshot(), frozen);
        assert!(frozen.identity().is_none());
        assert!(!harness.has_cached_identity());
        assert!(harness.store.is_empty());
        assert!(!harness.manager.refresh_scheduler().is_armed());

        harness.manager.dispose().await;
        assert_eq!(harness.provider.unsubscribe_count(), 1);
        assert!(harness.manager.is_disposed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_user_updated_heals_record_email() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness
            .provider
            .seed_session("a@example.com", chrono::Duration::hours(1))
            .unwrap();
        harness.manager.initialize().await;

        harness.provider.update_email("alice@example.com").unwrap();

        let state = harness
            .wait_until(|s| {
                s.identity()
                    .and_then(|i| i.email.as_ref())
                    .is_some_and(|e| e.as_str() == "alice@example.com")
            })
            .await;
        assert!(!state.is_loading());

        let alice = harness.provider.principal("alice@example.com").unwrap();
        let record = harness.store.get(&alice.id).unwrap();
        assert_eq!(record.email.map(|e| e.to_string()).as_deref(), Some("alice@example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_refreshed_rearms_single_timer() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness
            .provider
            .seed_session("a@example.com", chrono::Duration::hours(1))
            .unwrap();
        harness.manager.initialize().await;
        assert!(harness.manager.refresh_scheduler().is_armed());

        let refreshed = harness.provider.current_session().unwrap();
        harness.provider.emit(AuthEvent::TokenRefreshed(refreshed));
        tokio::time::sleep(Duration::from_millis(10)).await;

        let scheduler = harness.manager.refresh_scheduler();
        assert!(scheduler.is_armed());
        assert_eq!(scheduler.cancellations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missed_events_resync_from_provider() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness.manager.initialize().await;
        assert_eq!(harness.provider.get_session_calls(), 1);

        // Keep the listener busy so the queue overflows behind it
        let alice = harness.provider.principal("a@example.com").unwrap();
        harness
            .store
            .set_lookup_latency(&alice.id, Duration::from_secs(2));
        let session = harness
            .provider
            .sign_in_with_credentials("a@example.com", "correct-horse")
            .await
            .unwrap();
        harness.wait_until(|s| s.is_loading()).await;

        harness.provider.sign_out().await.unwrap();
        for _ in 0..70 {
            harness
                .provider
                .emit(AuthEvent::TokenRefreshed(session.clone()));
        }

        tokio::time::sleep(Duration::from_secs(5)).await;
        let state = harness.manager.snapshot();
        assert!(state.identity().is_none());
        assert!(!state.is_loading());
        assert!(!harness.has_cached_identity());
        assert!(!harness.manager.refresh_scheduler().is_armed());
        // The SIGNED_OUT was dropped; only a fresh query could see it
        assert_eq!(harness.provider.get_session_calls(), 2);
    }
}

#[cfg(test)]
mod refresh_tests {
    use super::support::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_near_expiry_forces_sign_out() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness
            .provider
            .seed_session("a@example.com", chrono::Duration::seconds(30))
            .unwrap();
        harness.provider.set_fail_refresh(true);

        assert!(harness.manager.start().await.is_ok());
        assert_eq!(harness.store.len(), 1);

        let state = harness.wait_until(|s| s.identity().is_none()).await;
        assert!(!state.is_privileged());
        assert!(!state.is_loading());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(harness.manager.refresh_scheduler().fired(), 1);
        assert_eq!(harness.provider.sign_out_calls(), 1);
        assert!(harness.provider.current_session().is_none());
        assert!(!harness.has_cached_identity());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_refresh_keeps_identity() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness
            .provider
            .seed_session("a@example.com", chrono::Duration::seconds(30))
            .unwrap();

        harness.manager.start().await;
        tokio::time::sleep(Duration::from_millis(100)).await;

        let scheduler = harness.manager.refresh_scheduler();
        assert_eq!(harness.provider.refresh_calls(), 1);
        assert_eq!(scheduler.fired(), 1);
        // Re-armed for the new one-hour session
        assert!(scheduler.is_armed());
        assert_eq!(display_name(&harness.manager.snapshot()), Some("Alice"));
    }
}

#[cfg(test)]
mod visibility_tests {
    use super::support::*;
    use crate::application::visibility::Visibility;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_foreground_without_session_changes_nothing() {
        let harness = Harness::new(provider_with(&[]));
        harness.manager.initialize().await;
        let before = harness.manager.snapshot();
        let mut rx = harness.manager.subscribe();

        assert!(!harness.manager.set_visibility(Visibility::Background));
        assert!(harness.manager.set_visibility(Visibility::Foreground));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(harness.provider.get_session_calls(), 2);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(harness.manager.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreground_picks_up_privilege_change() {
        let harness = Harness::new(provider_with(&[("a@example.com", "Alice")]));
        harness
            .provider
            .seed_session("a@example.com", chrono::Duration::hours(1))
            .unwrap();
        harness.manager.initialize().await;
        assert!(!harness.manager.is_privileged());

        let alice = harness.provider.principal("a@example.com").unwrap();
        let mut record = harness.store.get(&alice.id).unwrap();
        record.is_admin = true;
        harness.store.put(record);

        let mut rx = harness.manager.subscribe();
        harness.manager.set_visibility(Visibility::Background);
        harness.manager.set_visibility(Visibility::Foreground);

        rx.changed().await.unwrap();
        let state = rx.borrow_and_update().clone();
        assert!(state.is_privileged());
        assert!(!state.is_loading());
        assert!(harness.identity_cache().read().unwrap().privileged);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_foreground_resyncs_once() {
        let harness = Harness::new(provider_with(&[]));
        harness.manager.initialize().await;

        harness.manager.set_visibility(Visibility::Background);
        assert!(harness.manager.set_visibility(Visibility::Foreground));
        assert!(!harness.manager.set_visibility(Visibility::Foreground));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(harness.provider.get_session_calls(), 2);
    }
}

#[cfg(test)]
mod action_tests {
    use super::support::*;
    use crate::application::config::SessionConfig;
    use crate::domain::privilege::BootstrapAdmin;
    use crate::domain::value_object::email::Email;
    use crate::infra::memory::InMemoryIdentityProvider;

    #[tokio::test(start_paused = true)]
    async fn test_login_resolves_identity() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness.manager.initialize().await;

        let outcome = harness.manager.login("jane@example.com", "correct-horse").await;
        assert!(outcome.is_ok());

        let state = harness
            .wait_until(|s| s.identity().is_some() && !s.is_loading())
            .await;
        assert_eq!(display_name(&state), Some("Jane"));
        assert!(harness.has_cached_identity());
        assert!(harness.manager.refresh_scheduler().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_before_start_initializes_first() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));

        let outcome = harness.manager.login("jane@example.com", "correct-horse").await;
        assert!(outcome.is_ok());
        assert_eq!(harness.provider.get_session_calls(), 1);

        let state = harness
            .wait_until(|s| s.identity().is_some() && !s.is_loading())
            .await;
        assert_eq!(display_name(&state), Some("Jane"));
        assert!(state.is_initialized());
    }

    #[tokio::test]
    async fn test_login_with_wrong_secret() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness.manager.initialize().await;

        let outcome = harness.manager.login("jane@example.com", "wrong").await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Invalid email or password."));
        assert!(!harness.manager.is_loading());
        assert!(harness.manager.identity().is_none());
    }

    #[tokio::test]
    async fn test_login_with_malformed_email() {
        let harness = Harness::new(provider_with(&[]));
        let outcome = harness.manager.login("not-an-email", "secret").await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("Invalid email format"));
        assert!(!harness.manager.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_register_uses_profile_name() {
        let harness = Harness::new(provider_with(&[]));
        harness.manager.initialize().await;

        let outcome = harness
            .manager
            .register("new@example.com", "s3cret", "  New User ")
            .await;
        assert!(outcome.is_ok());

        let state = harness.wait_until(|s| s.identity().is_some()).await;
        assert_eq!(display_name(&state), Some("New User"));
        assert!(!state.is_privileged());
    }

    #[tokio::test]
    async fn test_register_existing_account_conflicts() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness.manager.initialize().await;

        let outcome = harness
            .manager
            .register("jane@example.com", "s3cret", "Jane")
            .await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("already exists"));
        assert!(!harness.manager.is_loading());
    }

    #[tokio::test]
    async fn test_register_pending_confirmation_stops_loading() {
        let harness = Harness::new(InMemoryIdentityProvider::default().requiring_confirmation());
        harness.manager.initialize().await;

        let outcome = harness
            .manager
            .register("new@example.com", "s3cret", "")
            .await;
        assert!(outcome.is_ok());
        assert!(!harness.manager.is_loading());
        assert!(harness.manager.identity().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_bootstrap_admin_is_privileged_on_first_sign_up() {
        let config = SessionConfig::default()
            .with_bootstrap_admin(BootstrapAdmin::new(Email::new("root@example.com").unwrap()));
        let harness = Harness::with_config(InMemoryIdentityProvider::default(), config);
        harness.manager.initialize().await;

        harness
            .manager
            .register("root@example.com", "s3cret", "Root")
            .await;

        let state = harness.wait_until(|s| s.identity().is_some()).await;
        assert!(state.is_privileged());
        assert!(harness.manager.check_privileged().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_clears_identity_and_cache() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness
            .provider
            .seed_session("jane@example.com", chrono::Duration::hours(1))
            .unwrap();
        harness.manager.initialize().await;
        assert!(harness.has_cached_identity());

        assert!(harness.manager.logout().await.is_ok());

        let state = harness.wait_until(|s| s.identity().is_none()).await;
        assert!(!state.is_privileged());
        assert!(!harness.has_cached_identity());
        assert!(!harness.manager.refresh_scheduler().is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_clears_locally_when_provider_fails() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness
            .provider
            .seed_session("jane@example.com", chrono::Duration::hours(1))
            .unwrap();
        harness.manager.initialize().await;
        harness.provider.set_fail_sign_out(true);

        let outcome = harness.manager.logout().await;
        assert!(!outcome.success);

        harness.wait_until(|s| s.identity().is_none()).await;
        assert!(!harness.has_cached_identity());
    }

    #[tokio::test]
    async fn test_check_privileged_does_not_mutate_state() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness.manager.initialize().await;
        let before = harness.manager.snapshot();

        assert!(!harness.manager.check_privileged().await);
        assert_eq!(harness.manager.snapshot(), before);
    }

    #[tokio::test]
    async fn test_actions_after_dispose_are_rejected() {
        let harness = Harness::new(provider_with(&[("jane@example.com", "Jane")]));
        harness.manager.initialize().await;
        harness.manager.dispose().await;

        let outcome = harness.manager.login("jane@example.com", "correct-horse").await;
        assert!(!outcome.success);
        assert!(harness.provider.current_session().is_none());
        assert_eq!(harness.provider.unsubscribe_count(), 1);
    }
}
