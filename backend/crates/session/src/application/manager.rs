//! Session Lifecycle Manager
//!
//! Façade owning every component of the session lifecycle. Constructed
//! explicitly, started once and disposed once; consumers read the
//! observable [`ManagerState`] and drive sign-in through the action methods.

use std::sync::Arc;

use parking_lot::Mutex;
use platform::storage::KeyValueStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::cache::IdentityCache;
use crate::application::config::SessionConfig;
use crate::application::initializer::SessionInitializer;
use crate::application::listener::{AuthEventListener, ListenerCommand};
use crate::application::outcome::ActionOutcome;
use crate::application::resolver::IdentityResolver;
use crate::application::scheduler::TokenRefreshScheduler;
use crate::application::state::{ManagerState, SessionState};
use crate::application::visibility::{Visibility, VisibilityResync};
use crate::domain::entity::identity::Identity;
use crate::domain::repository::{IdentityProvider, SignUpProfile, UserRecordStore};
use crate::domain::value_object::email::Email;
use crate::error::{SessionError, SessionResult};

pub struct SessionLifecycleManager<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    provider: Arc<P>,
    config: Arc<SessionConfig>,
    state: SessionState,
    resolver: Arc<IdentityResolver<S>>,
    scheduler: Arc<TokenRefreshScheduler<P>>,
    visibility: Arc<VisibilityResync<P, S>>,
    listener: Arc<AuthEventListener<P, S>>,
    initializer: SessionInitializer<P, S>,
    commands: mpsc::UnboundedSender<ListenerCommand>,
    liveness: CancellationToken,
    safety: Mutex<Option<JoinHandle<()>>>,
}

impl<P, S> SessionLifecycleManager<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    pub fn new(
        provider: Arc<P>,
        store: Arc<S>,
        cache_store: Arc<dyn KeyValueStore>,
        config: SessionConfig,
    ) -> Self {
        let config = Arc::new(config);
        let liveness = CancellationToken::new();
        let state = SessionState::new();
        let cache = IdentityCache::new(cache_store, config.cache_key.clone());
        let (commands, command_rx) = mpsc::unbounded_channel();

        let resolver = Arc::new(IdentityResolver::new(
            store,
            config.record_retry,
            config.bootstrap_admin.clone(),
        ));
        let scheduler = Arc::new(TokenRefreshScheduler::new(
            Arc::clone(&provider),
            config.refresh_margin,
            commands.clone(),
            liveness.clone(),
        ));
        let visibility = Arc::new(VisibilityResync::new(
            Arc::clone(&provider),
            Arc::clone(&resolver),
            cache.clone(),
            commands.clone(),
            liveness.clone(),
            config.resolve_timeout,
        ));
        let listener = Arc::new(AuthEventListener::new(
            Arc::clone(&provider),
            Arc::clone(&resolver),
            cache.clone(),
            state.clone(),
            Arc::clone(&scheduler),
            Arc::clone(&visibility),
            command_rx,
            liveness.clone(),
            config.resolve_timeout,
        ));
        let initializer = SessionInitializer::new(
            Arc::clone(&provider),
            Arc::clone(&resolver),
            cache,
            state.clone(),
            Arc::clone(&listener),
            commands.clone(),
            liveness.clone(),
            config.init_timeout,
        );

        Self {
            provider,
            config,
            state,
            resolver,
            scheduler,
            visibility,
            listener,
            initializer,
            commands,
            liveness,
            safety: Mutex::new(None),
        }
    }

    /// Start the manager: same as [`Self::initialize`]
    pub async fn start(&self) -> ActionOutcome {
        self.initialize().await
    }

    /// Arm the startup safety valve and run the single-flight
    /// initialization, see [`SessionInitializer`]
    pub async fn initialize(&self) -> ActionOutcome {
        self.arm_safety_timeout();
        self.initializer.initialize().await
    }

    fn arm_safety_timeout(&self) {
        let mut safety = self.safety.lock();
        if safety.is_some() || self.liveness.is_cancelled() {
            return;
        }

        let state = self.state.clone();
        let liveness = self.liveness.clone();
        let timeout = self.config.safety_timeout;

        *safety = Some(tokio::spawn(async move {
            tokio::select! {
                _ = liveness.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    if state.force_initialized() {
                        tracing::warn!(
                            timeout_ms = timeout.as_millis() as u64,
                            "Startup did not settle in time, forcing initialized"
                        );
                    }
                }
            }
        }));
    }

    pub fn snapshot(&self) -> ManagerState {
        self.state.snapshot()
    }

    /// Observe state changes
    pub fn subscribe(&self) -> watch::Receiver<ManagerState> {
        self.state.subscribe()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.snapshot().identity().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.state.snapshot().is_loading()
    }

    pub fn is_privileged(&self) -> bool {
        self.state.snapshot().is_privileged()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.snapshot().is_initialized()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn refresh_scheduler(&self) -> &TokenRefreshScheduler<P> {
        &self.scheduler
    }

    /// Sign in with email and secret. State settles when the provider's
    /// SIGNED_IN event has been handled. Initializes first if needed so the
    /// event has a listener.
    pub async fn login(&self, email: &str, secret: &str) -> ActionOutcome {
        self.outcome("login", self.try_login(email, secret).await)
    }

    async fn try_login(&self, email: &str, secret: &str) -> SessionResult<()> {
        self.ensure_live()?;
        let email = Email::new(email)?;
        self.initialize().await;

        self.state.begin_loading();
        if let Err(e) = self
            .provider
            .sign_in_with_credentials(email.as_str(), secret)
            .await
        {
            self.state.finish_loading();
            return Err(e);
        }
        Ok(())
    }

    /// Create an account. Succeeds without a session when the provider
    /// requires confirmation first.
    pub async fn register(&self, email: &str, secret: &str, display_name: &str) -> ActionOutcome {
        self.outcome(
            "register",
            self.try_register(email, secret, display_name).await,
        )
    }

    async fn try_register(&self, email: &str, secret: &str, display_name: &str) -> SessionResult<()> {
        self.ensure_live()?;
        let email = Email::new(email)?;
        let display_name = match display_name.trim() {
            "" => email.local_part().to_string(),
            name => name.to_string(),
        };
        let profile = SignUpProfile::new(display_name);
        self.initialize().await;

        self.state.begin_loading();
        match self.provider.sign_up(email.as_str(), secret, &profile).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => {
                tracing::info!(email = %email, "Account created, confirmation pending");
                self.state.finish_loading();
                Ok(())
            }
            Err(e) => {
                self.state.finish_loading();
                Err(e)
            }
        }
    }

    /// End the session. Local state is cleared even if the provider call fails.
    pub async fn logout(&self) -> ActionOutcome {
        self.outcome("logout", self.try_logout().await)
    }

    async fn try_logout(&self) -> SessionResult<()> {
        self.ensure_live()?;
        if let Err(e) = self.provider.sign_out().await {
            let _ = self.commands.send(ListenerCommand::ForceSignOut {
                reason: "provider sign-out failed",
            });
            return Err(e);
        }
        Ok(())
    }

    /// Re-resolve the privileged flag for the current session without
    /// touching manager state
    pub async fn check_privileged(&self) -> bool {
        if self.liveness.is_cancelled() {
            return false;
        }
        match self.provider.get_session().await {
            Ok(Some(session)) => self.resolver.resolve(&session.principal).await.privileged,
            Ok(None) => false,
            Err(e) => {
                e.log();
                false
            }
        }
    }

    /// Report an application visibility change
    pub fn set_visibility(&self, visibility: Visibility) -> bool {
        self.visibility.notify(visibility)
    }

    /// Tear down: cancel timers, stop the listener and release the
    /// subscription. Later calls do nothing.
    pub async fn dispose(&self) {
        if self.liveness.is_cancelled() {
            return;
        }
        self.liveness.cancel();
        self.scheduler.disarm();
        if let Some(safety) = self.safety.lock().take() {
            safety.abort();
        }
        self.listener.shutdown().await;
        tracing::info!("Session manager disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.liveness.is_cancelled()
    }

    fn ensure_live(&self) -> SessionResult<()> {
        if self.liveness.is_cancelled() {
            return Err(SessionError::Disposed);
        }
        Ok(())
    }

    fn outcome(&self, action: &'static str, result: SessionResult<()>) -> ActionOutcome {
        match result {
            Ok(()) => ActionOutcome::ok(),
            Err(e) => {
                tracing::debug!(action, error = %e, "Session action failed");
                e.log();
                ActionOutcome::from(e)
            }
        }
    }
}

impl<P, S> Drop for SessionLifecycleManager<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    fn drop(&mut self) {
        // Lets the detached listener loop release its subscription
        self.liveness.cancel();
        if let Some(safety) = self.safety.get_mut().take() {
            safety.abort();
        }
    }
}
