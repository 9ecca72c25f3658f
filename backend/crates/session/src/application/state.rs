//! Manager State
//!
//! The observable `{identity, loading, privileged, initialized}` record,
//! published through a `watch` channel. Observers are only woken when a
//! field actually changes.

use std::sync::Arc;
use tokio::sync::watch;

use crate::domain::entity::identity::Identity;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagerState {
    identity: Option<Identity>,
    loading: bool,
    privileged: bool,
    initialized: bool,
}

impl ManagerState {
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn set_identity(&mut self, identity: Option<Identity>) {
        // Privileged is only ever derived here
        self.privileged = identity.as_ref().is_some_and(|i| i.privileged);
        self.identity = identity;
    }
}

/// Write handle on the shared [`ManagerState`]
#[derive(Debug, Clone)]
pub struct SessionState {
    tx: Arc<watch::Sender<ManagerState>>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ManagerState::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> ManagerState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ManagerState> {
        self.tx.subscribe()
    }

    pub(crate) fn begin_loading(&self) {
        self.tx.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
    }

    pub(crate) fn finish_loading(&self) {
        self.tx.send_if_modified(|s| std::mem::replace(&mut s.loading, false));
    }

    /// Settled outcome: identity replaced, loading off, initialized on
    pub(crate) fn settle(&self, identity: Option<Identity>) {
        self.tx.send_if_modified(|s| {
            let mut next = s.clone();
            next.set_identity(identity);
            next.loading = false;
            next.initialized = true;
            Self::replace_if_changed(s, next)
        });
    }

    /// Identity replaced without touching loading or initialized
    pub(crate) fn apply_identity(&self, identity: Option<Identity>) {
        self.tx.send_if_modified(|s| {
            let mut next = s.clone();
            next.set_identity(identity);
            Self::replace_if_changed(s, next)
        });
    }

    /// Settle only if nothing has settled yet. Returns true when applied.
    pub(crate) fn settle_if_pending(&self, identity: Option<Identity>) -> bool {
        self.tx.send_if_modified(|s| {
            if s.initialized {
                return false;
            }
            s.set_identity(identity);
            s.loading = false;
            s.initialized = true;
            true
        })
    }

    /// Startup safety valve. Returns true when it had to intervene.
    pub(crate) fn force_initialized(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if s.initialized {
                return false;
            }
            s.loading = false;
            s.initialized = true;
            true
        })
    }

    fn replace_if_changed(current: &mut ManagerState, next: ManagerState) -> bool {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    }
}
