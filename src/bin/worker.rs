use axum::{routing::get, Router};
use batch_edit_worker::{
    app_state::AppState,
    config::AppConfig,
    db::{self, queries::PgJobStore},
    routes,
    services::{poller::Poller, storage::R2Client, transport::ImageTransport},
};
use std::future::IntoFuture;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const STATUS_SERVER_GRACE: Duration = Duration::from_secs(5);

/// How the status server task ended.
#[derive(Debug, PartialEq, Eq)]
enum ServerExit {
    Stopped,
    Failed,
    TimedOut,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting batch edit worker");

    // Load configuration
    let config = AppConfig::from_env().expect("Failed to load configuration");

    let prometheus_handle =
        routes::metrics::install_recorder().expect("Failed to install Prometheus metrics recorder");

    // Initialize database
    tracing::info!("Connecting to PostgreSQL");
    let db_pool = db::init_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Running database migrations");
    db::run_migrations(&db_pool)
        .await
        .expect("Failed to run database migrations");

    // Initialize services
    tracing::info!("Initializing R2 storage client");
    let r2_client = R2Client::new(
        &config.r2_bucket,
        &config.r2_endpoint,
        &config.r2_access_key,
        &config.r2_secret_key,
        &config.public_base_url,
    )
    .expect("Failed to initialize R2 client");

    let transport = ImageTransport::new(
        Arc::new(r2_client),
        &config.artifact_namespace,
        config.jpeg_quality,
        config.fetch_timeout(),
    )
    .expect("Failed to initialize HTTP client");

    let store = Arc::new(PgJobStore::new(db_pool.clone()));
    let poller = Poller::new(store, transport, config.poll_interval())
        .with_strict_settings(config.strict_settings);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    // Status server: health + metrics
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .with_state(AppState::new(db_pool))
        .route(
            "/metrics",
            get(routes::metrics::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!("Status server listening on {}", config.bind_addr);

    let server = tokio::spawn(
        axum::serve(listener, app)
            .with_graceful_shutdown(cancel.clone().cancelled_owned())
            .into_future(),
    );

    tracing::info!(
        poll_interval_secs = config.poll_interval_secs,
        recovery_cutoff_minutes = config.recovery_cutoff_minutes,
        strict_settings = config.strict_settings,
        "Worker ready"
    );

    let result = match poller.recover_stuck(config.recovery_window()).await {
        Ok(_) => poller.run(cancel.clone()).await,
        Err(e) => Err(e),
    };

    cancel.cancel();
    stop_status_server(server, STATUS_SERVER_GRACE).await;

    match result {
        Ok(()) => {
            tracing::info!("Worker stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Job store failure, exiting");
            ExitCode::FAILURE
        }
    }
}

/// Wait for SIGINT or SIGTERM.
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
            tracing::info!("Received SIGINT, finishing current job and shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, finishing current job and shutting down");
        }
    }
}

/// Wait up to `grace` for the status server to drain, logging how it ended.
async fn stop_status_server(
    mut server: JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> ServerExit {
    match tokio::time::timeout(grace, &mut server).await {
        Ok(Ok(Ok(()))) => {
            tracing::info!("Status server stopped");
            ServerExit::Stopped
        }
        Ok(Ok(Err(e))) => {
            tracing::error!(error = %e, "Status server error");
            ServerExit::Failed
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Status server task failed");
            ServerExit::Failed
        }
        Err(_) => {
            tracing::warn!(
                grace_secs = grace.as_secs_f64(),
                "Status server did not stop in time, aborting"
            );
            server.abort();
            ServerExit::TimedOut
        }
    }
}
