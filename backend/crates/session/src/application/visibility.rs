//! Visibility Resync
//!
//! Re-validates the session when the application returns to the
//! foreground. The resync is queued on the event listener and never touches
//! the `loading` flag, so a routine refocus does not flicker the UI.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::cache::IdentityCache;
use crate::application::listener::ListenerCommand;
use crate::application::resolver::IdentityResolver;
use crate::domain::entity::identity::Identity;
use crate::domain::repository::{IdentityProvider, UserRecordStore};
use crate::error::SessionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Foreground,
    Background,
}

pub struct VisibilityResync<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    provider: Arc<P>,
    resolver: Arc<IdentityResolver<S>>,
    cache: IdentityCache,
    commands: mpsc::UnboundedSender<ListenerCommand>,
    liveness: CancellationToken,
    resolve_timeout: Duration,
    foreground: AtomicBool,
}

impl<P, S> VisibilityResync<P, S>
where
    P: IdentityProvider + Send + Sync + 'static,
    S: UserRecordStore + Send + Sync + 'static,
{
    pub fn new(
        provider: Arc<P>,
        resolver: Arc<IdentityResolver<S>>,
        cache: IdentityCache,
        commands: mpsc::UnboundedSender<ListenerCommand>,
        liveness: CancellationToken,
        resolve_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            resolver,
            cache,
            commands,
            liveness,
            resolve_timeout,
            // Applications start in the foreground
            foreground: AtomicBool::new(true),
        }
    }

    /// Record a visibility change. Returns true when a resync was queued,
    /// which only happens on a background to foreground transition.
    pub fn notify(&self, visibility: Visibility) -> bool {
        let foreground = visibility == Visibility::Foreground;
        let was_foreground = self.foreground.swap(foreground, Ordering::SeqCst);

        if !foreground || was_foreground || self.liveness.is_cancelled() {
            return false;
        }

        tracing::debug!("Returned to foreground, queueing session resync");
        self.commands.send(ListenerCommand::Revalidate).is_ok()
    }

    /// Re-resolve the identity behind the current session and refresh the
    /// cache. `None` without a session or when resolution did not finish.
    pub async fn revalidate(&self) -> Option<Identity> {
        let session = match self.provider.get_session().await {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::debug!("No session to resync");
                return None;
            }
            Err(e) => {
                e.log();
                return None;
            }
        };

        let identity =
            match tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(&session.principal))
                .await
            {
                Ok(identity) => identity,
                Err(_) => {
                    SessionError::Timeout("foreground resync").log();
                    return None;
                }
            };

        if self.liveness.is_cancelled() {
            return None;
        }
        self.cache.write(&identity);
        tracing::debug!(principal = %identity.id, "Session resynced");
        Some(identity)
    }
}
