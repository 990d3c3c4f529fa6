use console_core::error::AppError;
use console_core::kv::RedisKv;
use console_core::observability::init_tracing;
use console_service::config::ConsoleConfig;
use console_service::services::KeepAlive;
use console_service::{build_router, AppState};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();

    let config = ConsoleConfig::from_env()?;
    init_tracing(&config.service_name, &config.log_level);

    let kv = Arc::new(RedisKv::connect(&config.redis.url).await?);
    let state = AppState::new(config, kv);

    if state.config.keepalive.enabled {
        let keepalive = KeepAlive::new(
            state.catalog.clone(),
            state.accounts.clone(),
            state.config.keepalive.clone(),
        );
        tokio::spawn(keepalive.run_scheduler());
    }

    let addr = format!("0.0.0.0:{}", state.config.common.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "console service listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
