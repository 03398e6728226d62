//! Shared application state for handlers

use crate::config::{PortalConfig, StoreBackend};
use crate::error::StartupError;
use portal_session::{CachedSessionStore, FileSessionStore, MemorySessionStore, SharedStore};
use portal_subscriptions::{LogEmailSender, UserService};
use portal_wizard::{
    CaptchaVerifier, HttpCaptchaVerifier, HttpSubmissionService, StaticCaptchaVerifier,
    WizardEngine,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Services every handler can reach
#[derive(Debug, Clone)]
pub struct AppState {
    /// Apply wizard
    pub engine: WizardEngine,
    /// Users and subscriptions
    pub users: Arc<UserService>,
}

impl AppState {
    /// Create from already-built services
    #[must_use]
    pub fn new(engine: WizardEngine, users: Arc<UserService>) -> Self {
        Self { engine, users }
    }

    /// Wire production collaborators from configuration
    ///
    /// Spawns the expiry sweep of the memory store, so must run inside a
    /// Tokio runtime.
    pub async fn from_config(config: &PortalConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let store = open_store(config).await?;
        let submission = HttpSubmissionService::new(
            config.submission.url.clone(),
            Duration::from_secs(config.submission.timeout_secs),
        )?;

        let captcha: Arc<dyn CaptchaVerifier> =
            match (&config.captcha.url, &config.captcha.secret) {
                (Some(url), Some(secret)) => Arc::new(HttpCaptchaVerifier::new(
                    url.clone(),
                    secret.clone(),
                    Duration::from_secs(config.captcha.timeout_secs),
                )?),
                _ => {
                    warn!("no captcha endpoint configured, accepting every non-empty token");
                    Arc::new(StaticCaptchaVerifier::accepting())
                }
            };

        let engine = WizardEngine::new(store, Arc::new(submission), captcha, config.wizard.clone());
        let users = Arc::new(UserService::new(
            Arc::new(LogEmailSender),
            config.confirmation_code,
        ));
        Ok(Self::new(engine, users))
    }
}

async fn open_store(config: &PortalConfig) -> Result<SharedStore, StartupError> {
    let store: SharedStore = match config.store.backend {
        StoreBackend::Memory => {
            let store = Arc::new(MemorySessionStore::new());
            spawn_purge(
                Arc::clone(&store),
                Duration::from_secs(config.store.purge_interval_secs.max(1)),
            );
            store
        }
        StoreBackend::File => Arc::new(FileSessionStore::open(&config.store.dir).await?),
        StoreBackend::Cached => {
            let inner: SharedStore = Arc::new(FileSessionStore::open(&config.store.dir).await?);
            Arc::new(CachedSessionStore::new(
                inner,
                config.store.cache_capacity,
                config.store.cache_ttl(),
            ))
        }
    };
    info!(backend = ?config.store.backend, store = store.name(), "session store ready");
    Ok(store)
}

fn spawn_purge(store: Arc<MemorySessionStore>, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let purged = store.purge_expired();
            if purged > 0 {
                debug!(purged, "expired sessions removed");
            }
        }
    });
}
