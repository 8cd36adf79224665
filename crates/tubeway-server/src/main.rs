mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header::{AUTHORIZATION, CONTENT_TYPE}};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use tubeway_api::media::DiskMediaStore;
use tubeway_api::{AppState, AppStateInner};
use tubeway_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tubeway=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database and media storage
    let db = Database::open(&config.db_path)?;
    tokio::fs::create_dir_all(&config.media_dir).await?;
    let media = DiskMediaStore::new(&config.media_dir, &config.public_url);

    let state: AppState = Arc::new(AppStateInner {
        db,
        media: Arc::new(media),
        tokens: config.tokens.clone(),
    });

    let cors = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(AllowOrigin::exact(HeaderValue::from_str(origin)?))
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE])
            .allow_credentials(true),
        None => CorsLayer::permissive(),
    };

    let app = Router::new()
        .merge(tubeway_api::router(state))
        .nest_service("/media", ServeDir::new(&config.media_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Tubeway server listening on {}", addr);
    info!("Media served from {} at {}/media", config.media_dir.display(), config.public_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
