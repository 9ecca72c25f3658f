//! Session Console Entry Point
//!
//! Wires the session lifecycle manager to the in-memory identity provider
//! and a file-backed identity cache, then drives a scripted run: sign-up,
//! background / foreground, privilege check, sign-out.
//! Uses `anyhow` for startup errors; session actions report through
//! `ActionOutcome`.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use platform::storage::FileKeyValueStore;
use session::domain::privilege::BootstrapAdmin;
use session::domain::value_object::email::Email;
use session::{
    ActionOutcome, InMemoryIdentityProvider, InMemoryUserRecordStore, ManagerState, SessionConfig,
    SessionLifecycleManager, Visibility,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Manager = SessionLifecycleManager<InMemoryIdentityProvider, InMemoryUserRecordStore>;

const DEMO_EMAIL: &str = "demo@example.com";
const DEMO_SECRET: &str = "correct-horse-battery";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "console=info,session=info,platform=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config()?;
    let ttl_secs: i64 = env_parse("SESSION_TTL_SECS")?.unwrap_or(3600);
    let cache_dir = env::var("SESSION_CACHE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".session-cache"));

    let cache = FileKeyValueStore::open(cache_dir.clone())
        .with_context(|| format!("opening identity cache at {}", cache_dir.display()))?;
    tracing::info!(cache_dir = %cache_dir.display(), ttl_secs, "Identity cache ready");

    let provider = Arc::new(InMemoryIdentityProvider::new(chrono::Duration::seconds(
        ttl_secs,
    )));
    let store = Arc::new(InMemoryUserRecordStore::new());
    let manager = SessionLifecycleManager::new(provider, store, Arc::new(cache), config);

    report("start", &manager.start().await);
    print_state(&manager.snapshot());

    let outcome = manager.register(DEMO_EMAIL, DEMO_SECRET, "Demo User").await;
    report("register", &outcome);
    if outcome.is_ok() {
        wait_for(&manager, |s| s.identity().is_some() && !s.is_loading()).await;
    }
    print_state(&manager.snapshot());

    manager.set_visibility(Visibility::Background);
    tokio::time::sleep(Duration::from_millis(200)).await;
    if manager.set_visibility(Visibility::Foreground) {
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    tracing::info!(
        privileged = manager.check_privileged().await,
        "Privilege re-checked"
    );

    report("logout", &manager.logout().await);
    wait_for(&manager, |s| s.identity().is_none()).await;
    print_state(&manager.snapshot());

    let refresh = manager.refresh_scheduler();
    tracing::info!(
        fired = refresh.fired(),
        cancellations = refresh.cancellations(),
        "Refresh timer statistics"
    );

    manager.dispose().await;
    Ok(())
}

fn load_config() -> anyhow::Result<SessionConfig> {
    let mut config = if cfg!(debug_assertions) {
        SessionConfig::development()
    } else {
        SessionConfig::default()
    };

    if let Some(ms) = env_parse::<u64>("SESSION_INIT_TIMEOUT_MS")? {
        config = config.with_init_timeout(Duration::from_millis(ms));
    }

    if let Ok(admin) = env::var("SESSION_BOOTSTRAP_ADMIN") {
        let email = Email::new(admin)
            .map_err(|e| anyhow::anyhow!(e.user_message()))
            .context("SESSION_BOOTSTRAP_ADMIN")?;
        tracing::info!(email = %email, "Bootstrap administrator configured");
        config = config.with_bootstrap_admin(BootstrapAdmin::new(email));
    }

    tracing::debug!(
        init_timeout_ms = config.init_timeout_ms(),
        safety_timeout_ms = config.safety_timeout_ms(),
        "Session configuration loaded"
    );
    Ok(config)
}

fn env_parse<T>(key: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(Some(raw.trim().parse().with_context(|| format!("parsing {key}"))?)),
        Err(_) => Ok(None),
    }
}

async fn wait_for(manager: &Manager, done: impl FnMut(&ManagerState) -> bool) {
    let mut rx = manager.subscribe();
    match tokio::time::timeout(Duration::from_secs(5), rx.wait_for(done)).await {
        Ok(Ok(_)) => {}
        Ok(Err(_)) => tracing::warn!("Session state channel closed"),
        Err(_) => tracing::warn!("Session state did not settle in time"),
    }
}

fn report(action: &str, outcome: &ActionOutcome) {
    match &outcome.error {
        None => tracing::info!(action, "Action succeeded"),
        Some(error) => tracing::warn!(action, error = %error, "Action failed"),
    }
}

fn print_state(state: &ManagerState) {
    let identity = state
        .identity()
        .map(|i| i.display_name.as_str())
        .unwrap_or("<none>");
    tracing::info!(
        identity,
        loading = state.is_loading(),
        privileged = state.is_privileged(),
        initialized = state.is_initialized(),
        "Session state"
    );
}
