//! Token Refresh Scheduler
//!
//! Keeps at most one timer that refreshes the session shortly before it
//! expires. A failed refresh forces a full sign-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::listener::ListenerCommand;
use crate::domain::entity::session::Session;
use crate::domain::repository::IdentityProvider;

/// Spawned timer. `fired` flips once the delay has elapsed and the refresh
/// call is under way; from then on the task is left to finish.
struct PendingRefresh {
    handle: JoinHandle<()>,
    fired: Arc<AtomicBool>,
}

impl PendingRefresh {
    fn is_waiting(&self) -> bool {
        !self.fired.load(Ordering::SeqCst) && !self.handle.is_finished()
    }
}

pub struct TokenRefreshScheduler<P>
where
    P: IdentityProvider + Send + Sync + 'static,
{
    provider: Arc<P>,
    margin: Duration,
    commands: mpsc::UnboundedSender<ListenerCommand>,
    liveness: CancellationToken,
    pending: Mutex<Option<PendingRefresh>>,
    cancellations: AtomicU64,
    fired: Arc<AtomicU64>,
}

impl<P> TokenRefreshScheduler<P>
where
    P: IdentityProvider + Send + Sync + 'static,
{
    pub fn new(
        provider: Arc<P>,
        margin: Duration,
        commands: mpsc::UnboundedSender<ListenerCommand>,
        liveness: CancellationToken,
    ) -> Self {
        Self {
            provider,
            margin,
            commands,
            liveness,
            pending: Mutex::new(None),
            cancellations: AtomicU64::new(0),
            fired: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Schedule a refresh `margin` before `session` expires, replacing any
    /// pending timer. Fires immediately when less than `margin` remains;
    /// nothing is scheduled for an already expired session.
    pub fn arm(&self, session: &Session) {
        if self.liveness.is_cancelled() {
            return;
        }

        let mut pending = self.pending.lock();
        self.cancel(&mut pending);

        let remaining = match session.time_until_expiry(Utc::now()).to_std() {
            Ok(remaining) if !remaining.is_zero() => remaining,
            _ => {
                tracing::debug!(
                    principal = %session.principal.id,
                    "Session already expired, no refresh scheduled"
                );
                return;
            }
        };
        let delay = remaining.saturating_sub(self.margin);

        tracing::debug!(
            principal = %session.principal.id,
            delay_ms = delay.as_millis() as u64,
            "Refresh timer armed"
        );

        let provider = Arc::clone(&self.provider);
        let commands = self.commands.clone();
        let liveness = self.liveness.clone();
        let fired_count = Arc::clone(&self.fired);
        let fired = Arc::new(AtomicBool::new(false));
        let task_fired = Arc::clone(&fired);
        let principal = session.principal.id.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = liveness.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            task_fired.store(true, Ordering::SeqCst);
            fired_count.fetch_add(1, Ordering::SeqCst);
            tracing::info!(principal = %principal, "Refreshing session before expiry");

            match provider.refresh_session().await {
                Ok(_) => {
                    // The provider's TOKEN_REFRESHED event re-arms the timer
                    tracing::debug!(principal = %principal, "Session refreshed");
                }
                Err(e) => {
                    e.log();
                    if liveness.is_cancelled() {
                        return;
                    }
                    tracing::error!(principal = %principal, "Refresh failed, forcing sign-out");
                    if let Err(e) = provider.sign_out().await {
                        e.log();
                    }
                    // Clears local state even when the provider is unreachable
                    let _ = commands.send(ListenerCommand::ForceSignOut {
                        reason: "refresh failed",
                    });
                }
            }
        });
        *pending = Some(PendingRefresh { handle, fired });
    }

    /// Cancel the pending timer, if any
    pub fn disarm(&self) {
        let mut pending = self.pending.lock();
        self.cancel(&mut pending);
    }

    /// Whether a timer is still waiting for its deadline
    pub fn is_armed(&self) -> bool {
        self.pending.lock().as_ref().is_some_and(PendingRefresh::is_waiting)
    }

    /// Number of timers cancelled before they fired
    pub fn cancellations(&self) -> u64 {
        self.cancellations.load(Ordering::SeqCst)
    }

    /// Number of timers that reached their refresh attempt
    pub fn fired(&self) -> u64 {
        self.fired.load(Ordering::SeqCst)
    }

    fn cancel(&self, pending: &mut Option<PendingRefresh>) {
        let Some(refresh) = pending.take() else {
            return;
        };
        // Once fired, the refresh call runs to completion
        if refresh.is_waiting() {
            refresh.handle.abort();
            self.cancellations.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("Pending refresh timer cancelled");
        }
    }
}

impl<P> Drop for TokenRefreshScheduler<P>
where
    P: IdentityProvider + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if let Some(refresh) = self.pending.get_mut().take() {
            refresh.handle.abort();
        }
    }
}
