//! In-Memory Adapters
//!
//! Process-local identity provider and user-record store. Used by the
//! console binary and the test suite; both support fault injection.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::domain::entity::{
    principal::Principal,
    session::Session,
    user_record::{UserRecord, UserRecordPatch},
};
use crate::domain::event::AuthEvent;
use crate::domain::repository::{IdentityProvider, SignUpProfile, UserRecordStore};
use crate::domain::subscription::Subscription;
use crate::domain::value_object::{email::Email, principal_id::PrincipalId, user_id::UserId};
use crate::error::{SessionError, SessionResult};

const EVENT_CAPACITY: usize = 64;

// ============================================================================
// Identity provider
// ============================================================================

struct Account {
    principal: Principal,
    secret: String,
}

#[derive(Default)]
struct ProviderState {
    accounts: HashMap<Email, Account>,
    current: Option<Session>,
}

/// Session faults injected into `get_session`
#[derive(Debug, Clone, Copy, Default)]
struct SessionFaults {
    stall: bool,
    fail: bool,
    latency: Option<Duration>,
}

pub struct InMemoryIdentityProvider {
    inner: Mutex<ProviderState>,
    events: broadcast::Sender<AuthEvent>,
    ttl: chrono::Duration,
    auto_confirm: bool,
    session_faults: Mutex<SessionFaults>,
    refresh_latency: Mutex<Option<Duration>>,
    fail_refresh: AtomicBool,
    fail_sign_out: AtomicBool,
    get_session_calls: AtomicUsize,
    refresh_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
    unsubscribe_count: Arc<AtomicUsize>,
}

impl Default for InMemoryIdentityProvider {
    fn default() -> Self {
        Self::new(chrono::Duration::hours(1))
    }
}

impl InMemoryIdentityProvider {
    /// Provider issuing sessions valid for `ttl`
    pub fn new(ttl: chrono::Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(ProviderState::default()),
            events,
            ttl,
            auto_confirm: true,
            session_faults: Mutex::new(SessionFaults::default()),
            refresh_latency: Mutex::new(None),
            fail_refresh: AtomicBool::new(false),
            fail_sign_out: AtomicBool::new(false),
            get_session_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
            unsubscribe_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sign-ups return no session until confirmed out of band
    pub fn requiring_confirmation(mut self) -> Self {
        self.auto_confirm = false;
        self
    }

    /// Register an account up front
    pub fn with_account(self, email: &str, secret: &str, display_name: &str) -> SessionResult<Self> {
        let email = Email::new(email)?;
        let principal = Principal::new(PrincipalId::generate())
            .with_email(email.clone())
            .with_display_name(display_name);
        self.inner.lock().accounts.insert(
            email,
            Account {
                principal,
                secret: secret.to_string(),
            },
        );
        Ok(self)
    }

    /// Install a session for a registered account without emitting an
    /// event, as if restored from the provider's own storage
    pub fn seed_session(&self, email: &str, expires_in: chrono::Duration) -> SessionResult<Session> {
        let email = Email::new(email)?;
        let mut inner = self.inner.lock();
        let principal = inner
            .accounts
            .get(&email)
            .map(|account| account.principal.clone())
            .ok_or(SessionError::InvalidCredentials)?;
        let session = Self::issue(principal, expires_in);
        inner.current = Some(session.clone());
        Ok(session)
    }

    /// Change the signed-in principal's email and emit USER_UPDATED
    pub fn update_email(&self, email: &str) -> SessionResult<Session> {
        let email = Email::new(email)?;
        let session = {
            let mut inner = self.inner.lock();
            let ProviderState { accounts, current } = &mut *inner;
            let session = current.as_mut().ok_or(SessionError::NoActiveSession)?;
            if accounts.contains_key(&email) {
                return Err(SessionError::AccountExists);
            }

            let previous = session.principal.email.replace(email.clone());
            if let Some(mut account) = previous.and_then(|old| accounts.remove(&old)) {
                account.principal.email = Some(email.clone());
                accounts.insert(email, account);
            }
            session.clone()
        };
        self.emit(AuthEvent::UserUpdated(session.clone()));
        Ok(session)
    }

    /// Push an event to every subscriber
    pub fn emit(&self, event: AuthEvent) {
        tracing::debug!(event = event.name(), "Provider event emitted");
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    /// Principal of a registered account
    pub fn principal(&self, email: &str) -> Option<Principal> {
        let email = Email::new(email).ok()?;
        self.inner
            .lock()
            .accounts
            .get(&email)
            .map(|account| account.principal.clone())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.inner.lock().current.clone()
    }

    /// `get_session` never completes
    pub fn set_stall_sessions(&self, stall: bool) {
        self.session_faults.lock().stall = stall;
    }

    /// `get_session` returns a provider error
    pub fn set_fail_sessions(&self, fail: bool) {
        self.session_faults.lock().fail = fail;
    }

    pub fn set_session_latency(&self, latency: Duration) {
        self.session_faults.lock().latency = Some(latency);
    }

    /// Delay every `refresh_session` call before it rotates the session
    pub fn set_refresh_latency(&self, latency: Duration) {
        *self.refresh_latency.lock() = Some(latency);
    }

    pub fn set_fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sign_out(&self, fail: bool) {
        self.fail_sign_out.store(fail, Ordering::SeqCst);
    }

    pub fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    /// Number of subscriptions released
    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribe_count.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn issue(principal: Principal, expires_in: chrono::Duration) -> Session {
        Session::new(
            principal,
            format!("access-{}", Uuid::new_v4()),
            Some(format!("refresh-{}", Uuid::new_v4())),
            Utc::now() + expires_in,
        )
    }
}

impl IdentityProvider for InMemoryIdentityProvider {
    async fn get_session(&self) -> SessionResult<Option<Session>> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        let faults = *self.session_faults.lock();

        if faults.stall {
            std::future::pending::<()>().await;
        }
        if let Some(latency) = faults.latency {
            tokio::time::sleep(latency).await;
        }
        if faults.fail {
            return Err(SessionError::ProviderUnavailable(
                "session endpoint returned an error".to_string(),
            ));
        }

        Ok(self.current_session())
    }

    fn subscribe(&self) -> Subscription {
        let released = Arc::clone(&self.unsubscribe_count);
        Subscription::new(self.events.subscribe(), move || {
            released.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn refresh_session(&self) -> SessionResult<Session> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.refresh_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(SessionError::RefreshFailed(
                "refresh token revoked".to_string(),
            ));
        }

        let session = {
            let mut inner = self.inner.lock();
            let principal = inner
                .current
                .as_ref()
                .map(|session| session.principal.clone())
                .ok_or(SessionError::NoActiveSession)?;
            let session = Self::issue(principal, self.ttl);
            inner.current = Some(session.clone());
            session
        };

        self.emit(AuthEvent::TokenRefreshed(session.clone()));
        Ok(session)
    }

    async fn sign_in_with_credentials(&self, email: &str, secret: &str) -> SessionResult<Session> {
        let email = Email::new(email).map_err(|_| SessionError::InvalidCredentials)?;

        let session = {
            let mut inner = self.inner.lock();
            let principal = inner
                .accounts
                .get(&email)
                .filter(|account| account.secret == secret)
                .map(|account| account.principal.clone())
                .ok_or(SessionError::InvalidCredentials)?;
            let session = Self::issue(principal, self.ttl);
            inner.current = Some(session.clone());
            session
        };

        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(
        &self,
        email: &str,
        secret: &str,
        profile: &SignUpProfile,
    ) -> SessionResult<Option<Session>> {
        let email = Email::new(email)?;

        let session = {
            let mut inner = self.inner.lock();
            if inner.accounts.contains_key(&email) {
                return Err(SessionError::AccountExists);
            }

            let principal = Principal::new(PrincipalId::generate())
                .with_email(email.clone())
                .with_display_name(profile.display_name.clone());
            inner.accounts.insert(
                email,
                Account {
                    principal: principal.clone(),
                    secret: secret.to_string(),
                },
            );

            if !self.auto_confirm {
                return Ok(None);
            }
            let session = Self::issue(principal, self.ttl);
            inner.current = Some(session.clone());
            session
        };

        self.emit(AuthEvent::SignedIn(session.clone()));
        Ok(Some(session))
    }

    async fn sign_out(&self) -> SessionResult<()> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out.load(Ordering::SeqCst) {
            return Err(SessionError::ProviderUnavailable(
                "sign-out endpoint unreachable".to_string(),
            ));
        }

        self.inner.lock().current = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }
}

// ============================================================================
// User-record store
// ============================================================================

#[derive(Default)]
pub struct InMemoryUserRecordStore {
    records: Mutex<HashMap<PrincipalId, UserRecord>>,
    lookup_latency: Mutex<HashMap<PrincipalId, Duration>>,
    insert_attempts: AtomicUsize,
    failing_inserts: AtomicUsize,
    fail_lookups: AtomicBool,
}

impl InMemoryUserRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record directly, bypassing fault injection
    pub fn put(&self, record: UserRecord) {
        self.records
            .lock()
            .insert(record.principal_id.clone(), record);
    }

    pub fn get(&self, principal_id: &PrincipalId) -> Option<UserRecord> {
        self.records.lock().get(principal_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Calls to `insert`, successful or not
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }

    /// Reject the next `count` inserts
    pub fn fail_next_inserts(&self, count: usize) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_lookups(&self, fail: bool) {
        self.fail_lookups.store(fail, Ordering::SeqCst);
    }

    /// Delay lookups of one principal
    pub fn set_lookup_latency(&self, principal_id: &PrincipalId, latency: Duration) {
        self.lookup_latency
            .lock()
            .insert(principal_id.clone(), latency);
    }
}

impl UserRecordStore for InMemoryUserRecordStore {
    async fn find_by_principal(
        &self,
        principal_id: &PrincipalId,
    ) -> SessionResult<Option<UserRecord>> {
        let latency = self.lookup_latency.lock().get(principal_id).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.fail_lookups.load(Ordering::SeqCst) {
            return Err(SessionError::RecordResolution(
                "user record lookup failed".to_string(),
            ));
        }

        Ok(self.get(principal_id))
    }

    async fn insert(&self, record: &UserRecord) -> SessionResult<UserRecord> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);

        let rejected = self
            .failing_inserts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(SessionError::RecordResolution(
                "user record insert rejected".to_string(),
            ));
        }

        let mut records = self.records.lock();
        if records.contains_key(&record.principal_id) {
            return Err(SessionError::AccountExists);
        }
        records.insert(record.principal_id.clone(), record.clone());
        Ok(record.clone())
    }

    async fn update(&self, user_id: &UserId, patch: &UserRecordPatch) -> SessionResult<UserRecord> {
        let mut records = self.records.lock();
        let record = records
            .values_mut()
            .find(|record| record.user_id == *user_id)
            .ok_or_else(|| SessionError::RecordResolution(format!("no record {user_id}")))?;
        record.apply(patch);
        Ok(record.clone())
    }
}
