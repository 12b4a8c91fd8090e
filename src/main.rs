use anyhow::anyhow;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mantto::config::AppConfig;
use mantto::http;
use mantto::infra::db::Db;
use mantto::infra::identity::{IdentityProvider, MemoryIdentity, PgIdentity};
use mantto::infra::memory::MemoryStore;
use mantto::infra::pg::PgStore;
use mantto::infra::prefs::FilePrefs;
use mantto::infra::store::MaintenanceStore;
use mantto::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let (store, identity): (Arc<dyn MaintenanceStore>, Arc<dyn IdentityProvider>) =
        match config.store_backend.as_str() {
            "postgres" => {
                let db = Db::connect(&config).await?;
                (
                    Arc::new(PgStore::new(db.clone())),
                    Arc::new(PgIdentity::new(db)),
                )
            }
            "memory" => {
                tracing::warn!("running with the in-memory store, data is not persisted");
                (
                    Arc::new(MemoryStore::new()),
                    Arc::new(MemoryIdentity::new()),
                )
            }
            other => return Err(anyhow!("unknown STORE_BACKEND: {}", other)),
        };

    let prefs = Arc::new(FilePrefs::new(config.prefs_path.clone()));
    let state = AppState::build(store, identity, prefs, &config).await?;

    let app: Router = http::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
