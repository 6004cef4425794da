use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::{
    clock::{Clock, SystemClock},
    config::AppConfig,
    repos::OAuthRepo,
    security::TokenSigner,
    sweep::CodeSweeper,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub repo: Arc<dyn OAuthRepo>,
    pub tokens: Arc<TokenSigner>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: AppConfig, repo: Arc<dyn OAuthRepo>, clock: Arc<dyn Clock>) -> Self {
        let tokens = Arc::new(TokenSigner::new(&config.oauth.jwt_secret));
        Self { config, repo, tokens, clock }
    }
}

pub async fn run() -> anyhow::Result<()> {
    // logging
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    let config = AppConfig::load()?;
    tracing::info!(?config, "loaded config");

    // Initialize DB pool and run migrations eagerly on startup
    let pool = crate::db::sqlite::make_pool(&config.db.url)?;
    {
        let mut conn = pool.get()?;
        crate::db::migrations::run_sqlite_migrations(&mut conn)?;
    }

    let repo: Arc<dyn OAuthRepo> = crate::repos::sqlite::SqliteOAuthRepo::new(pool);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    if let Err(e) = crate::seed::seed_default_client(repo.as_ref(), &config.oauth, clock.as_ref()).await {
        tracing::error!(error = ?e, "failed to initialize default OAuth client");
    }

    let sweeper = CodeSweeper::start(
        repo.clone(),
        clock.clone(),
        Duration::from_secs(config.oauth.sweep_interval_secs),
    );

    let state = AppState::new(config.clone(), repo, clock);
    let app = build_router(state);

    let addr = config.server.bind_addr.clone();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    sweeper.stop().await;
    served?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_allowed_origin);
    let router = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/oauth/clients", post(crate::web::handlers::clients::create_client))
        .route("/oauth/authorize", get(crate::web::handlers::oauth::authorize))
        .route("/oauth/token", post(crate::web::handlers::oauth::token))
        .route("/oauth/me", get(crate::web::handlers::account::me))
        .with_state(state);

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };
    router.layer(TraceLayer::new_for_http())
}

fn cors_layer(origin: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(origin) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(%origin, error = %e, "invalid CORS origin; cross-origin requests disabled");
            return None;
        }
    };
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
    )
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
