//! Application state wiring.
//!
//! Every collaborator is an explicit handle built once at startup and
//! injected into the services that need it — no global clients.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;

use shelfmark_auth::middleware::AuthState;
use shelfmark_auth::storage::{SessionStore, TokenBlacklist, UserStore};
use shelfmark_auth::{JwtService, TokenLifecycle, VerificationService};
use shelfmark_postgres::{PgUserStore, PgVerificationTokenStore, ShelfStorage};

use crate::cache::{CacheBackend, CacheSessionStore, CacheTokenBlacklist, RateLimiter};
use crate::config::AppConfig;
use crate::mail::{self, MailSender};
use crate::services::{BookService, UserService};
use crate::uploads::ThumbnailStore;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: ShelfStorage,
    pub cache: CacheBackend,
    pub auth: AuthState,
    pub sessions: Arc<dyn SessionStore>,
    pub verification: Arc<VerificationService>,
    pub mailer: Arc<dyn MailSender>,
    pub books: Arc<BookService>,
    pub users: Arc<UserService>,
    pub rate_limiter: RateLimiter,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl AppState {
    /// Connects every dependency and wires the services.
    pub async fn build(config: AppConfig) -> Result<Self, String> {
        let pg = config
            .storage
            .postgres
            .clone()
            .ok_or_else(|| "storage.postgres config is required".to_string())?;

        let storage = ShelfStorage::connect(
            &pg.connection_url(),
            pg.pool_size,
            pg.connect_timeout_ms,
        )
        .await
        .map_err(|e| format!("database connection failed: {e}"))?;
        storage
            .ensure_schema()
            .await
            .map_err(|e| format!("schema bootstrap failed: {e}"))?;

        let cache = if config.redis.enabled {
            let pool = deadpool_redis::Config::from_url(&config.redis.url)
                .builder()
                .map_err(|e| format!("redis config error: {e}"))?
                .max_size(config.redis.pool_size)
                .wait_timeout(Some(Duration::from_millis(config.redis.timeout_ms)))
                .runtime(deadpool_redis::Runtime::Tokio1)
                .build()
                .map_err(|e| format!("redis pool error: {e}"))?;
            tracing::info!(url = %config.redis.url, "Redis cache enabled");
            CacheBackend::new_redis(pool)
        } else {
            tracing::info!("Redis disabled, using in-process cache");
            CacheBackend::new_local()
        };

        let sessions: Arc<dyn SessionStore> = Arc::new(CacheSessionStore::new(
            cache.clone(),
            config.cache.session_ttl(),
        ));
        let blacklist: Arc<dyn TokenBlacklist> =
            Arc::new(CacheTokenBlacklist::new(cache.clone()));
        let user_store: Arc<dyn UserStore> = Arc::new(PgUserStore::new(storage.pool_arc()));

        let jwt = JwtService::new(
            &config.auth.access_secret,
            &config.auth.refresh_secret,
            config.auth.access_ttl(),
            config.auth.refresh_ttl(),
        );
        let lifecycle = Arc::new(TokenLifecycle::new(jwt, blacklist, user_store));
        let auth = AuthState::new(Arc::clone(&lifecycle), Arc::clone(&sessions));

        let verification = Arc::new(VerificationService::new(Arc::new(
            PgVerificationTokenStore::new(storage.pool_arc()),
        )));

        let mailer = mail::from_config(&config.mail).map_err(|e| e.to_string())?;

        let thumbnails = ThumbnailStore::new(&config.uploads.dir);
        let books = Arc::new(BookService::new(
            storage.clone(),
            cache.clone(),
            thumbnails,
            config.cache.book_ttl(),
            config.cache.list_ttl(),
            config.cache.stats_ttl(),
        ));
        let users = Arc::new(UserService::new(
            storage.clone(),
            cache.clone(),
            Arc::clone(&sessions),
            config.cache.user_ttl(),
            config.cache.stats_ttl(),
        ));

        let rate_limiter = RateLimiter::new(
            cache.clone(),
            Duration::from_secs(config.rate_limit.window_secs),
            config.rate_limit.max_requests,
            config.rate_limit.enabled,
        );

        Ok(Self {
            config: Arc::new(config),
            storage,
            cache,
            auth,
            sessions,
            verification,
            mailer,
            books,
            users,
            rate_limiter,
        })
    }
}
