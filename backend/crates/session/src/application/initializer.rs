//! Session Initializer
//!
//! One-time startup: attach the event listener, query the provider for an
//! existing session and resolve the initial identity. Concurrent callers
//! share a single execution; the whole sequence races a hard timeout after
//! which the cached identity is used.
//!
//! The restored identity is handed to the listener rather than written
//! directly, so an event handled during startup always wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OnceCell, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::application::cache::IdentityCache;
use crate::application::listener::{AuthEventListener, ListenerCommand};
use crate::application::outcome::ActionOutcome;
use crate::application::resolver::IdentityResolver;
use crate::application::state::SessionState;
use crate::domain::repository::{IdentityProvider, UserRecordStore};
use crate::error::SessionError;

pub struct SessionInitializer<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    provider: Arc<P>,
    resolver: Arc<IdentityResolver<S>>,
    cache: IdentityCache,
    state: SessionState,
    listener: Arc<AuthEventListener<P, S>>,
    commands: mpsc::UnboundedSender<ListenerCommand>,
    liveness: CancellationToken,
    timeout: Duration,
    outcome: OnceCell<ActionOutcome>,
}

impl<P, S> SessionInitializer<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    pub fn new(
        provider: Arc<P>,
        resolver: Arc<IdentityResolver<S>>,
        cache: IdentityCache,
        state: SessionState,
        listener: Arc<AuthEventListener<P, S>>,
        commands: mpsc::UnboundedSender<ListenerCommand>,
        liveness: CancellationToken,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            resolver,
            cache,
            state,
            listener,
            commands,
            liveness,
            timeout,
            outcome: OnceCell::new(),
        }
    }

    /// Run startup once. Every caller, concurrent or later, receives the
    /// outcome of that single run.
    pub async fn initialize(&self) -> ActionOutcome {
        self.outcome.get_or_init(|| self.run()).await.clone()
    }

    /// Whether startup has completed (successfully or not)
    pub fn is_complete(&self) -> bool {
        self.outcome.initialized()
    }

    async fn run(&self) -> ActionOutcome {
        if self.liveness.is_cancelled() {
            return SessionError::Disposed.into();
        }

        let started = tokio::time::Instant::now();
        self.state.begin_loading();
        let cached = self.cache.read();

        // The subscription must outlive a timed-out restore
        self.listener.attach(self.provider.subscribe());

        match tokio::time::timeout(self.timeout, self.restore()).await {
            Ok(()) => {
                tracing::info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Session initialized"
                );
                ActionOutcome::ok()
            }
            Err(_) => {
                let err = SessionError::Timeout("initialization");
                err.log();
                if !self.liveness.is_cancelled() {
                    tracing::warn!(
                        cached = cached.is_some(),
                        "Falling back to cached identity"
                    );
                    self.state.settle_if_pending(cached);
                }
                err.into()
            }
        }
    }

    async fn restore(&self) {
        // Anything the listener settles from here on supersedes this restore
        let epoch = self.listener.epoch();

        let session = match self.provider.get_session().await {
            Ok(session) => session,
            Err(e) => {
                e.log();
                tracing::warn!("Session query failed, continuing as signed out");
                None
            }
        };
        if self.liveness.is_cancelled() {
            return;
        }

        let identity = match &session {
            Some(session) => Some(self.resolver.resolve(&session.principal).await),
            None => self.cache.read(),
        };
        if self.liveness.is_cancelled() {
            return;
        }

        let fallback = identity.clone();
        let (done, applied) = oneshot::channel();
        let command = ListenerCommand::Restore {
            session,
            identity,
            epoch,
            done,
        };
        let delivered = self.commands.send(command).is_ok() && applied.await.is_ok();
        if !delivered && !self.liveness.is_cancelled() {
            tracing::warn!("Auth event listener not running, settling restored identity directly");
            self.state.settle_if_pending(fallback);
        }
    }
}
