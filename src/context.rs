//! Application context.
//!
//! Built once at startup and passed to whatever needs auth, storage, or
//! client state. Components are handed out already wired.

use std::sync::Arc;
use std::time::Duration;

use crate::backend::{AuthApi, RestBackend, StorageApi, TableApi};
use crate::client::ReqwestTransport;
use crate::config::GuardConfig;
use crate::error::GuardResult;
use crate::lifecycle::Teardown;
use crate::notice::Notifier;
use crate::persist::{FileStore, KeyValueStore, MemoryStore};
use crate::resilience::RetryLoader;
use crate::security::{secure_client, RateLimiter, TokenStore};
use crate::session::{ActivityClock, SessionGuard, SessionTimeout};
use crate::upload::UploadPipeline;

pub struct AppContext {
    config: Arc<GuardConfig>,
    auth: Arc<dyn AuthApi>,
    tables: Arc<dyn TableApi>,
    storage: Arc<dyn StorageApi>,
    durable: Arc<dyn KeyValueStore>,
    session_store: Arc<dyn KeyValueStore>,
    tokens: Arc<TokenStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<ActivityClock>,
    teardown: Teardown,
}

impl AppContext {
    /// Wire components around an existing backend.
    pub fn new<B>(
        config: GuardConfig,
        backend: Arc<B>,
        durable: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self
    where
        B: AuthApi + TableApi + StorageApi + 'static,
    {
        let tokens = Arc::new(TokenStore::new(durable.clone()));
        Self::assemble(config, backend, durable, tokens, notifier)
    }

    /// Wire the HTTP backend behind the outbound middleware chain.
    pub fn connect(config: GuardConfig, notifier: Arc<dyn Notifier>) -> GuardResult<Self> {
        let durable: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&config.security.state_path)?);
        let tokens = Arc::new(TokenStore::new(durable.clone()));
        let limiter = Arc::new(RateLimiter::new(&config.security.rate_limit));
        let transport = ReqwestTransport::new(Duration::from_secs(config.backend.request_timeout_secs))?;

        let client = secure_client(
            transport,
            limiter,
            tokens.clone(),
            &config.security.csrf_header,
            notifier.clone(),
        )?;
        let backend = Arc::new(RestBackend::new(
            client,
            &config.backend.url,
            config.backend.anon_key.clone(),
            durable.clone(),
        )?);

        tracing::info!(
            backend = %config.backend.url,
            state = %config.security.state_path,
            rate_limit = config.security.rate_limit.max_requests,
            "Context connected"
        );
        Ok(Self::assemble(config, backend, durable, tokens, notifier))
    }

    fn assemble<B>(
        config: GuardConfig,
        backend: Arc<B>,
        durable: Arc<dyn KeyValueStore>,
        tokens: Arc<TokenStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self
    where
        B: AuthApi + TableApi + StorageApi + 'static,
    {
        let auth: Arc<dyn AuthApi> = backend.clone();
        let tables: Arc<dyn TableApi> = backend.clone();
        let storage: Arc<dyn StorageApi> = backend;
        Self {
            config: Arc::new(config),
            auth,
            tables,
            storage,
            durable,
            session_store: Arc::new(MemoryStore::new()),
            tokens,
            notifier,
            clock: Arc::new(ActivityClock::new()),
            teardown: Teardown::new(),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn durable_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.durable
    }

    pub fn session_store(&self) -> &Arc<dyn KeyValueStore> {
        &self.session_store
    }

    pub fn tokens(&self) -> &Arc<TokenStore> {
        &self.tokens
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn activity_clock(&self) -> &Arc<ActivityClock> {
        &self.clock
    }

    pub fn teardown(&self) -> &Teardown {
        &self.teardown
    }

    /// A fresh guard for one page.
    pub fn session_guard(&self) -> SessionGuard {
        SessionGuard::new(
            self.auth.clone(),
            self.tables.clone(),
            self.session_store.clone(),
            self.config.auth.clone(),
        )
    }

    pub fn retry_loader(&self) -> RetryLoader {
        RetryLoader::new(self.tables.clone(), self.config.retry.clone())
    }

    pub fn upload_pipeline(&self) -> UploadPipeline {
        UploadPipeline::new(
            self.storage.clone(),
            self.tables.clone(),
            self.notifier.clone(),
            self.config.upload.clone(),
        )
    }

    pub fn session_timeout(&self, guard: Arc<SessionGuard>) -> SessionTimeout {
        SessionTimeout::new(
            guard,
            self.clock.clone(),
            self.notifier.clone(),
            self.config.security.session_timeout.clone(),
        )
    }
}
