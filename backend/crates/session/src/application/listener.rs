//! Auth Event Listener
//!
//! Long-lived consumer of the provider's session-change stream. Events are
//! handled one at a time, in emission order; a handler fully settles state
//! before the next event is read. Internal commands (forced sign-out,
//! foreground resync, the startup restore) go through the same queue so that
//! every state change is serialized here.
//!
//! Each handler that settles the signed-in principal bumps an epoch. The
//! startup restore carries the epoch it observed before querying the
//! provider and is dropped if anything settled in between.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::cache::IdentityCache;
use crate::application::resolver::IdentityResolver;
use crate::application::scheduler::TokenRefreshScheduler;
use crate::application::state::SessionState;
use crate::application::visibility::VisibilityResync;
use crate::domain::entity::{identity::Identity, session::Session};
use crate::domain::event::AuthEvent;
use crate::domain::repository::{IdentityProvider, UserRecordStore};
use crate::domain::subscription::{Notification, Subscription};
use crate::error::SessionError;

/// Work items raised inside the manager
#[derive(Debug)]
pub enum ListenerCommand {
    /// Clear the local session without waiting for the provider
    ForceSignOut { reason: &'static str },
    /// App returned to the foreground
    Revalidate,
    /// Startup result, applied only if the epoch is still `epoch`
    Restore {
        session: Option<Session>,
        identity: Option<Identity>,
        epoch: u64,
        done: oneshot::Sender<()>,
    },
}

enum Input {
    Event(AuthEvent),
    Command(ListenerCommand),
    Resync(u64),
}

pub struct AuthEventListener<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    provider: Arc<P>,
    resolver: Arc<IdentityResolver<S>>,
    cache: IdentityCache,
    state: SessionState,
    scheduler: Arc<TokenRefreshScheduler<P>>,
    visibility: Arc<VisibilityResync<P, S>>,
    liveness: CancellationToken,
    resolve_timeout: Duration,
    epoch: AtomicU64,
    commands: Mutex<Option<mpsc::UnboundedReceiver<ListenerCommand>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<P, S> AuthEventListener<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    pub fn new(
        provider: Arc<P>,
        resolver: Arc<IdentityResolver<S>>,
        cache: IdentityCache,
        state: SessionState,
        scheduler: Arc<TokenRefreshScheduler<P>>,
        visibility: Arc<VisibilityResync<P, S>>,
        commands: mpsc::UnboundedReceiver<ListenerCommand>,
        liveness: CancellationToken,
        resolve_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            resolver,
            cache,
            state,
            scheduler,
            visibility,
            liveness,
            resolve_timeout,
            epoch: AtomicU64::new(0),
            commands: Mutex::new(Some(commands)),
            task: Mutex::new(None),
        }
    }

    /// Start consuming `subscription`. Only the first call attaches; later
    /// subscriptions are released immediately.
    pub fn attach(self: &Arc<Self>, subscription: Subscription) -> bool {
        let mut task = self.task.lock();
        if self.liveness.is_cancelled() {
            return false;
        }
        if task.is_some() {
            tracing::warn!("Auth event listener already attached, releasing subscription");
            return false;
        }
        let Some(commands) = self.commands.lock().take() else {
            return false;
        };

        *task = Some(tokio::spawn(Arc::clone(self).run(subscription, commands)));
        true
    }

    pub fn is_attached(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Number of settling transitions handled so far
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn advance_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Wait for the loop to observe cancellation and release its subscription
    pub(crate) async fn shutdown(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    tracing::error!(error = %e, "Auth event listener task failed");
                }
            }
        }
    }

    async fn run(
        self: Arc<Self>,
        mut subscription: Subscription,
        mut commands: mpsc::UnboundedReceiver<ListenerCommand>,
    ) {
        tracing::debug!("Auth event listener started");

        loop {
            let input = tokio::select! {
                biased;
                _ = self.liveness.cancelled() => break,
                notification = subscription.next() => match notification {
                    Some(Notification::Event(event)) => Input::Event(event),
                    Some(Notification::Missed(missed)) => Input::Resync(missed),
                    None => {
                        tracing::warn!("Auth event stream closed by provider");
                        break;
                    }
                },
                Some(command) = commands.recv() => Input::Command(command),
            };

            tokio::select! {
                biased;
                _ = self.liveness.cancelled() => {
                    tracing::debug!("Listener torn down mid-handler, result discarded");
                    break;
                }
                _ = self.dispatch(input) => {}
            }
        }

        subscription.unsubscribe();
        tracing::debug!("Auth event listener stopped");
    }

    async fn dispatch(&self, input: Input) {
        match input {
            Input::Event(event) => self.handle_event(event).await,
            Input::Command(ListenerCommand::ForceSignOut { reason }) => self.force_sign_out(reason),
            Input::Command(ListenerCommand::Revalidate) => self.revalidate().await,
            Input::Command(ListenerCommand::Restore {
                session,
                identity,
                epoch,
                done,
            }) => {
                self.restore(session, identity, epoch, &done);
                let _ = done.send(());
            }
            Input::Resync(missed) => self.resync(missed).await,
        }
    }

    pub(crate) async fn handle_event(&self, event: AuthEvent) {
        tracing::debug!(event = event.name(), "Auth event received");

        match event {
            AuthEvent::SignedIn(session) => self.on_signed_in(session).await,
            AuthEvent::SignedOut => self.on_signed_out(),
            AuthEvent::TokenRefreshed(session) => self.on_token_refreshed(session),
            AuthEvent::UserUpdated(session) => self.on_user_updated(session).await,
        }
    }

    fn is_live(&self) -> bool {
        !self.liveness.is_cancelled()
    }

    async fn on_signed_in(&self, session: Session) {
        if !self.is_live() {
            return;
        }
        self.advance_epoch();
        self.establish(session).await;
    }

    /// Resolve and settle `session` as the signed-in session
    async fn establish(&self, session: Session) {
        self.state.begin_loading();

        let resolved =
            tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&session.principal))
                .await;
        if !self.is_live() {
            tracing::debug!("Listener torn down, discarding resolved identity");
            return;
        }

        match resolved {
            Ok(identity) => {
                tracing::info!(
                    principal = %identity.id,
                    privileged = identity.privileged,
                    "Signed in"
                );
                self.cache.write(&identity);
                self.state.settle(Some(identity));
                self.scheduler.arm(&session);
            }
            Err(_) => {
                // Fail closed: no identity rather than a stale one
                SessionError::Timeout("identity resolution").log();
                self.clear_identity();
            }
        }
    }

    /// Re-arm only for the principal currently settled
    fn on_token_refreshed(&self, session: Session) {
        let current = self.state.snapshot();
        if current.identity().is_some_and(|i| i.id == session.principal.id) {
            self.scheduler.arm(&session);
        } else {
            tracing::debug!(
                principal = %session.principal.id,
                "Token refresh for a principal no longer signed in, ignored"
            );
        }
    }

    fn on_signed_out(&self) {
        if !self.is_live() {
            return;
        }
        tracing::info!("Signed out");
        self.clear_identity();
    }

    fn force_sign_out(&self, reason: &'static str) {
        if !self.is_live() {
            return;
        }
        tracing::error!(reason, "Local session cleared");
        self.clear_identity();
    }

    fn clear_identity(&self) {
        self.advance_epoch();
        self.scheduler.disarm();
        self.cache.clear();
        self.state.settle(None);
    }

    async fn on_user_updated(&self, session: Session) {
        let resolved =
            tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&session.principal))
                .await;
        if !self.is_live() {
            return;
        }

        match resolved {
            Ok(identity) => {
                self.cache.write(&identity);
                self.state.apply_identity(Some(identity));
            }
            Err(_) => SessionError::Timeout("user update").log(),
        }
        self.scheduler.arm(&session);
    }

    fn restore(
        &self,
        session: Option<Session>,
        identity: Option<Identity>,
        epoch: u64,
        done: &oneshot::Sender<()>,
    ) {
        if !self.is_live() {
            return;
        }
        if done.is_closed() {
            tracing::debug!("Startup gave up waiting, restored session discarded");
            return;
        }
        let current = self.epoch();
        if current != epoch {
            tracing::debug!(
                observed = epoch,
                current,
                "Session changed during startup, restored session discarded"
            );
            return;
        }

        match session {
            Some(session) => {
                if let Some(identity) = &identity {
                    tracing::info!(
                        principal = %identity.id,
                        privileged = identity.privileged,
                        "Restored existing session"
                    );
                    self.cache.write(identity);
                }
                self.state.settle(identity);
                // A TOKEN_REFRESHED handled meanwhile armed a later deadline
                if !self.scheduler.is_armed() {
                    self.scheduler.arm(&session);
                }
            }
            None => {
                // Not re-validated: the provider has no session to check it against
                tracing::debug!(cached = identity.is_some(), "No existing session");
                self.state.settle(identity);
            }
        }
    }

    /// Events were dropped; the provider's current session is the truth
    async fn resync(&self, missed: u64) {
        if !self.is_live() {
            return;
        }
        tracing::warn!(missed, "Auth events missed, re-reading session from provider");
        self.advance_epoch();

        match self.provider.get_session().await {
            Ok(Some(session)) => self.establish(session).await,
            Ok(None) => {
                if self.is_live() {
                    tracing::info!("Signed out while events were missed");
                    self.clear_identity();
                }
            }
            Err(e) => {
                e.log();
                if self.is_live() {
                    tracing::error!("Session state unknown after missed events, clearing");
                    self.clear_identity();
                }
            }
        }
    }

    async fn revalidate(&self) {
        let Some(identity) = self.visibility.revalidate().await else {
            return;
        };
        if self.is_live() {
            self.state.apply_identity(Some(identity));
        }
    }
}
