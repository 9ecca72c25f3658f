//! Application Configuration
//!
//! Timing and policy knobs for the session lifecycle manager.

use std::time::Duration;

pub use platform::retry::RetryPolicy;

use crate::domain::privilege::BootstrapAdmin;

/// Session manager configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Budget for the startup session query and resolution (3 seconds)
    pub init_timeout: Duration,
    /// Hard ceiling after which `loading` is forced off at startup (5 seconds)
    pub safety_timeout: Duration,
    /// How long before expiry the refresh fires (1 minute)
    pub refresh_margin: Duration,
    /// Budget for one identity resolution inside the event listener
    pub resolve_timeout: Duration,
    /// Retry policy for user-record creation
    pub record_retry: RetryPolicy,
    /// Well-known key of the cached identity
    pub cache_key: String,
    /// Email seeded as administrator when its record is first created
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            init_timeout: Duration::from_secs(3),
            safety_timeout: Duration::from_secs(5),
            refresh_margin: Duration::from_secs(60),
            resolve_timeout: Duration::from_secs(10),
            record_retry: RetryPolicy::new(3, Duration::from_secs(1)),
            cache_key: "session.identity".to_string(),
            bootstrap_admin: None,
        }
    }
}

impl SessionConfig {
    /// Shorter retry backoff for local runs
    pub fn development() -> Self {
        Self {
            record_retry: RetryPolicy::new(3, Duration::from_millis(200)),
            ..Default::default()
        }
    }

    pub fn with_bootstrap_admin(mut self, admin: BootstrapAdmin) -> Self {
        self.bootstrap_admin = Some(admin);
        self
    }

    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    pub fn init_timeout_ms(&self) -> u64 {
        self.init_timeout.as_millis() as u64
    }

    pub fn safety_timeout_ms(&self) -> u64 {
        self.safety_timeout.as_millis() as u64
    }
}
