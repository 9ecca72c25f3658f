//! Event Subscription
//!
//! Owned handle on the provider's session-change stream. Releasing it runs
//! the provider's unsubscribe hook exactly once, whether through
//! [`Subscription::unsubscribe`] or on drop. Dropped events are surfaced,
//! never skipped silently.

use tokio::sync::broadcast::{self, error::RecvError};

use crate::domain::event::AuthEvent;

type UnsubscribeHook = Box<dyn FnOnce() + Send>;

/// Item delivered by a [`Subscription`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Event(AuthEvent),
    /// Events were dropped; local state may no longer match the provider
    Missed(u64),
}

pub struct Subscription {
    events: broadcast::Receiver<AuthEvent>,
    on_unsubscribe: Option<UnsubscribeHook>,
}

impl Subscription {
    pub fn new(
        events: broadcast::Receiver<AuthEvent>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            events,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    /// Next notification in emission order, `None` once the provider closed
    /// the stream.
    ///
    /// Cancel-safe. When this receiver fell behind, the dropped events are
    /// reported as [`Notification::Missed`] so the consumer can resync.
    pub async fn next(&mut self) -> Option<Notification> {
        match self.events.recv().await {
            Ok(event) => Some(Notification::Event(event)),
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Auth event subscriber lagged, events dropped");
                Some(Notification::Missed(skipped))
            }
            Err(RecvError::Closed) => None,
        }
    }

    pub fn unsubscribe(mut self) {
        self.release();
    }

    pub fn is_active(&self) -> bool {
        self.on_unsubscribe.is_some()
    }

    fn release(&mut self) {
        if let Some(hook) = self.on_unsubscribe.take() {
            hook();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}
