//! # PrintCRM API Server
//!
//! Loads configuration, connects to PostgreSQL, applies migrations and
//! serves the API until SIGINT/SIGTERM.
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://localhost/printcrm JWT_SECRET=... cargo run -p printcrm-api
//! ```

use printcrm_api::{
    app::{build_router, AppState},
    config::{Config, IdentityProviderKind, LogFormat},
};
use printcrm_shared::{
    db::{migrations::run_migrations, pool::create_pool},
    models::user::User,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "printcrm_api=debug,printcrm_shared=debug,tower_http=debug";

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        identity_provider = ?config.identity.provider,
        deletion_policy = %config.account.deletion_policy,
        "PrintCRM API server starting"
    );

    let pool = create_pool(config.database.pool_config()).await?;
    run_migrations(&pool).await?;

    // The fixed provider answers for a user that must exist for profile
    // and report queries.
    if config.identity.provider == IdentityProviderKind::Fixed {
        let user =
            User::ensure_exists(&pool, config.identity.fixed_id, &config.identity.fixed_email).await?;
        tracing::warn!(user_id = %user.id, email = %user.email, "Serving every request as the fixed identity");
    }

    let bind_address = config.bind_address();
    let app = build_router(AppState::new(pool.clone(), config));

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}
