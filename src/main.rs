//! revise-auth - authentication and session-lifecycle service

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use revise_auth::{
    api::{self, AppState},
    config::Config,
    db::{
        self,
        repositories::{SqlxSessionRepository, SqlxUserRepository},
    },
    services::{auth::AuthService, oauth::HttpIdentityProvider, token::TokenIssuer},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "revise_auth=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting revise-auth service...");

    // Load configuration
    let config = Config::load(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    if config.uses_default_secret() {
        tracing::warn!(
            "Token secret is the built-in development fallback; \
             set REVISE_AUTH_TOKEN_SECRET before exposing this service"
        );
    }

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Create repositories and services
    let user_repo = SqlxUserRepository::boxed(pool.clone());
    let session_repo = SqlxSessionRepository::boxed(pool.clone());
    let token_issuer = Arc::new(TokenIssuer::new(
        &config.auth.token_secret,
        chrono::Duration::days(config.auth.session_ttl_days),
    ));
    let identity_provider = Arc::new(HttpIdentityProvider::new(
        config.auth.oauth_userinfo_url.clone(),
    ));

    let auth_service = Arc::new(AuthService::new(
        user_repo,
        session_repo,
        token_issuer,
        identity_provider,
    ));

    // Expired-session sweep task (interval 0 disables it)
    if config.auth.sweep_interval_secs > 0 {
        let sweeper = auth_service.clone();
        let period = tokio::time::Duration::from_secs(config.auth.sweep_interval_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match sweeper.sweep_expired_sessions().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::info!(removed, "Swept expired sessions"),
                    Err(e) => tracing::warn!("Session sweep failed: {:#}", e),
                }
            }
        });
    }

    // Build application state and router
    let state = AppState {
        auth_service,
        auth_config: Arc::new(config.auth.clone()),
    };
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
