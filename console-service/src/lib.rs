pub mod config;
pub mod cookies;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use console_core::kv::KvStore;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::{ConsoleConfig, Environment};
use crate::services::{
    AccountStore, LoginLockout, PlatformClient, ServiceCache, ServiceCatalog, SessionService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConsoleConfig>,
    pub kv: Arc<dyn KvStore>,
    pub platform: Arc<PlatformClient>,
    pub catalog: ServiceCatalog,
    pub sessions: SessionService,
    pub lockout: LoginLockout,
    pub accounts: AccountStore,
}

impl AppState {
    pub fn new(config: ConsoleConfig, kv: Arc<dyn KvStore>) -> Self {
        let platform = Arc::new(PlatformClient::new(config.upstream.clone()));
        let cache = ServiceCache::new(kv.clone(), config.cache.clone());
        let catalog = ServiceCatalog::new(platform.clone(), cache);
        let sessions = SessionService::new(kv.clone(), config.session.clone());
        let lockout = LoginLockout::new(kv.clone(), config.lockout.clone());
        let accounts = AccountStore::new(kv.clone());

        Self {
            config: Arc::new(config),
            kv,
            platform,
            catalog,
            sessions,
            lockout,
            accounts,
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.config.environment == Environment::Prod
    }
}

pub fn build_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::app::health))
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/api/csrf", get(handlers::auth::csrf_token));

    let protected = Router::new()
        .route("/api/services", get(handlers::services::list_services))
        .route("/api/deploy", post(handlers::services::trigger_deploy))
        .route(
            "/api/accounts",
            get(handlers::accounts::list_accounts).post(handlers::accounts::create_account),
        )
        .route(
            "/api/accounts/test",
            post(handlers::accounts::test_account_key),
        )
        .route(
            "/api/accounts/:account_id",
            put(handlers::accounts::update_account).delete(handlers::accounts::delete_account),
        )
        .route(
            "/api/services/:account/:service_id",
            get(handlers::service_control::get_service),
        )
        .route(
            "/api/services/:account/:service_id/suspend",
            post(handlers::service_control::suspend_service),
        )
        .route(
            "/api/services/:account/:service_id/resume",
            post(handlers::service_control::resume_service),
        )
        .route(
            "/api/services/:account/:service_id/restart",
            post(handlers::service_control::restart_service),
        )
        .route(
            "/api/services/:account/:service_id/scale",
            post(handlers::monitoring::scale_service),
        )
        .route(
            "/api/deploys/:account/:service_id",
            get(handlers::service_control::list_deploys),
        )
        .route(
            "/api/deploys/:account/:deploy_id/cancel",
            post(handlers::service_control::cancel_deploy),
        )
        .route(
            "/api/deploys/:account/:deploy_id/rollback",
            post(handlers::service_control::rollback_deploy),
        )
        .route(
            "/api/env-vars/:account/:service_id",
            get(handlers::env_vars::get_env_vars).put(handlers::env_vars::replace_env_vars),
        )
        .route(
            "/api/env-vars/:account/:service_id/:key",
            put(handlers::env_vars::upsert_env_var).delete(handlers::env_vars::delete_env_var),
        )
        .route(
            "/api/instances/:account/:service_id",
            get(handlers::monitoring::get_instances),
        )
        .route(
            "/api/logs/:account/:service_id",
            get(handlers::monitoring::get_logs),
        )
        .route(
            "/api/events/:account/:service_id",
            get(handlers::monitoring::get_events),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session_middleware,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(axum_middleware::from_fn(middleware::csrf_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
