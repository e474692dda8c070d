use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use signoff_core::ApprovalEngine;
use signoff_db::{DbPool, PgStore};
use signoff_events::{EventBus, LoggingNotifier};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use signoff_api::config::ServerConfig;
use signoff_api::router::build_app_router;
use signoff_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signoff_api=debug,signoff_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    let (engine, pool) = match &config.database_url {
        Some(url) => {
            let pool = connect_database(url).await;
            let store = Arc::new(PgStore::new(pool.clone()));
            let engine = ApprovalEngine::new(store.clone(), store.clone(), store);
            (engine, Some(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data will not persist");
            (ApprovalEngine::in_memory(), None)
        }
    };
    let engine = engine.with_max_conflict_retries(config.max_conflict_retries);

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let notifier_handle = tokio::spawn(LoggingNotifier::run(event_bus.subscribe()));
    tracing::info!("Event bus and notifier started");

    // --- App state ---
    let state = AppState {
        engine: Arc::new(engine),
        pool,
        config: Arc::new(config.clone()),
        event_bus: Arc::clone(&event_bus),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Dropping the last sender closes the channel and stops the notifier.
    drop(event_bus);
    match tokio::time::timeout(Duration::from_secs(5), notifier_handle).await {
        Ok(Ok(handled)) => tracing::info!(handled, "Notifier stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "Notifier task failed"),
        Err(_) => tracing::warn!("Notifier did not stop within 5s"),
    }

    tracing::info!("Graceful shutdown complete");
}

/// Connect, verify and migrate the database. Any failure aborts startup.
async fn connect_database(url: &str) -> DbPool {
    let pool = signoff_db::create_pool(url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    signoff_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    signoff_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    pool
}

/// Wait for SIGINT or SIGTERM (on Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
