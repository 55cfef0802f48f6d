use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use yalp_api::auth::TokenIssuer;
use yalp_api::cache::MokaCache;
use yalp_api::config::AppConfig;
use yalp_api::database::DatabaseManager;
use yalp_api::metrics::{HttpMetrics, METRICS_PREFIX};
use yalp_api::policy::PolicyEnforcer;
use yalp_api::state::AppStateInner;
use yalp_api::usecase::UseCase;
use yalp_api::{mail, router};

#[derive(Parser)]
#[command(name = "yalp-api")]
#[command(about = "Yalp REST API server")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Listen port (overrides HTTP_PORT)")]
    port: Option<u16>,

    #[arg(long, help = "Load environment variables from this file instead of ./.env")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; an explicitly named one is not
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("failed to load env file {}", path.display()))?;
        }
        None => {
            let _ = dotenvy::dotenv();
        }
    }

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    if let Some(port) = cli.port {
        config.http.port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .init();
    info!("Starting Yalp API in {:?} mode", config.environment);

    let db = DatabaseManager::connect(&config.database).await.context("failed to connect to database")?;
    db.health_check().await.context("database is not answering")?;
    if config.database.run_migrations {
        db.migrate().await.context("failed to apply migrations")?;
    }

    let policy = Arc::new(
        PolicyEnforcer::load(&config.security.policy_path)
            .await
            .with_context(|| format!("failed to load policy from {}", config.security.policy_path.display()))?,
    );
    spawn_policy_reloader(policy.clone());

    let state = Arc::new(AppStateInner {
        usecase: UseCase::postgres(db.clone()),
        cache: Arc::new(MokaCache::new(config.cache.max_entries)),
        mailer: mail::from_config(&config.mail).context("failed to build mailer")?,
        policy,
        tokens: TokenIssuer::new(&config.security.jwt_secret, config.security.jwt_expiry_hours)?,
        metrics: HttpMetrics::new(METRICS_PREFIX).context("failed to register metrics")?,
        config,
    });

    let bind_addr = SocketAddr::from(([0, 0, 0, 0], state.config.http.port));
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Yalp API listening on http://{}", bind_addr);

    let app = router::app(state);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped, closing database pool");
    db.close().await;
    Ok(())
}

/// Re-reads the policy file on SIGHUP. A broken file keeps the old rules.
fn spawn_policy_reloader(policy: Arc<PolicyEnforcer>) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                warn!("SIGHUP handler unavailable, policy reload disabled: {}", e);
                return;
            }
        };
        while hangup.recv().await.is_some() {
            match policy.reload().await {
                Ok(count) => info!("Reloaded policy with {} rules", count),
                Err(e) => error!("Policy reload failed, keeping previous rules: {}", e),
            }
        }
    });

    #[cfg(not(unix))]
    let _ = policy;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
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
    info!("Shutdown signal received, draining in-flight requests");
}
