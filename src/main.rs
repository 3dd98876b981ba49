use std::sync::Arc;

use casino_rooms::config::Settings;
use casino_rooms::persistence::postgres::PostgresStore;
use casino_rooms::session::auth::OpaqueTokenAuth;
use casino_rooms::{build_state, router};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env();
    settings.validate();
    let settings = Arc::new(settings);

    let store = Arc::new(PostgresStore::connect(&settings.database_url).await?);
    let auth = Arc::new(OpaqueTokenAuth);

    let (state, matchmaker) = build_state(settings.clone(), store, auth);
    tokio::spawn(matchmaker.run());

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
