// Application entrypoint: logging, configuration, repository selection and the Axum server.

use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing_subscriber::EnvFilter;

use student_server::config::{AppConfig, DatabaseConfig};
use student_server::handlers::{router, AppState};
use student_server::repository::{RepositoryFactory, UserRepository};
use student_server::store::InMemoryStudentStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    let pool = connect_database(&cfg.database).await;
    let users: Arc<dyn UserRepository> = match pool {
        Some(ref p) => RepositoryFactory::postgres(p.clone()),
        None => RepositoryFactory::in_memory(),
    };
    tracing::info!(backend = if pool.is_some() { "postgres" } else { "memory" }, "user repository ready");

    let state = AppState {
        students: Arc::new(InMemoryStudentStore::seeded()?),
        users,
        lookup_timeout: cfg.lookup_timeout,
        db: pool,
    };

    let router = router(state);

    let (host, port) = cfg.server.bind_target();
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

// Compact logs by default; LOG_FORMAT=json for structured output. RUST_LOG overrides the filter.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,axum=info,tower_http=info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt().with_env_filter(env_filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).compact().init();
    }
}

// Postgres when configured and reachable, otherwise the in-memory repository.
async fn connect_database(cfg: &DatabaseConfig) -> Option<PgPool> {
    let url = cfg.url.as_deref()?;
    match PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .acquire_timeout(cfg.acquire_timeout)
        .connect(url)
        .await
    {
        Ok(p) => Some(p),
        Err(e) => {
            tracing::warn!(error = %e, "Postgres not available; starting with in-memory repository");
            None
        }
    }
}

async fn shutdown_signal() {
    // Wait for either Ctrl+C or a SIGTERM (Unix).
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! { _ = ctrl_c => {}, _ = terminate => {}, }
    tracing::info!("shutdown signal received");
}
