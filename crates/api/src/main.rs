//! API server entry point.

use api::config::{AdminSeed, Config};
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use domain::{NewAccount, TokenSigner};
use metrics_exporter_prometheus::PrometheusHandle;
use secrecy::ExposeSecret;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let signer = TokenSigner::new(config.jwt_secret.clone(), config.token_lifetime());

    match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresDocumentStore::connect(url)
                .await
                .expect("failed to connect to PostgreSQL");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using PostgreSQL document store");
            serve(store, signer, &config, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, records are kept in memory only");
            serve(InMemoryDocumentStore::new(), signer, &config, metrics_handle).await;
        }
    }
}

async fn serve<S: DocumentStore + Clone + 'static>(
    store: S,
    signer: TokenSigner,
    config: &Config,
    metrics_handle: PrometheusHandle,
) {
    let state = api::create_state(store, signer);

    if let Some(seed) = &config.admin {
        seed_admin(&state, seed).await;
    }

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}

async fn seed_admin<S: DocumentStore + Clone + 'static>(state: &api::AppState<S>, seed: &AdminSeed) {
    let account = NewAccount::new(&seed.name, &seed.email, seed.password.expose_secret());
    match state.auth.seed_admin(account).await {
        Ok(Some(user)) => tracing::info!(user = %user.id, "admin account seeded"),
        Ok(None) => tracing::debug!("admin account already present"),
        Err(e) => tracing::error!(error = %e, "admin seeding failed"),
    }
}
