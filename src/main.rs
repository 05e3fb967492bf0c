use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use qwishi::auth::PrincipalDirectory;
use qwishi::config::Config;
use qwishi::engine::{Engine, InMemoryStore};
use qwishi::gateway::SquareGateway;
use qwishi::merchant::EnvTokenSource;
use qwishi::state::AppState;
use qwishi::{observability, reaper, routes};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Dev convenience; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::from_env();
    observability::init(config.metrics_port)?;

    let principals = PrincipalDirectory::parse(&config.api_keys).context("invalid QWISHI_API_KEYS")?;
    let gateway = SquareGateway::new(
        config.square_base_url.clone(),
        config.square_version.clone(),
        config.http_timeout,
    )
    .context("failed to build Square client")?;

    let engine = Arc::new(Engine::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(gateway),
        Arc::new(EnvTokenSource::new()),
    ));

    let notify = engine.notify.clone();
    let every = config.reaper_interval;
    tokio::spawn(async move {
        reaper::run_reaper(notify, every).await;
    });

    let state = Arc::new(AppState::new(engine, principals.clone()));
    let app = routes::build_router(state).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    let addr = config.addr().context("invalid QWISHI_BIND/QWISHI_PORT")?;
    let listener = TcpListener::bind(addr).await?;
    info!("qwishi listening on http://{addr}");
    info!("  square: {}", config.square_base_url);
    info!("  auth: {}", if principals.is_open() { "open" } else { "api keys" });
    info!(
        "  metrics: {}",
        config
            .metrics_port
            .map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    info!("qwishi stopped");
    Ok(())
}

/// Resolves on ctrl-c or SIGTERM; in-flight requests are drained by axum.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!("failed to register SIGTERM handler: {e}");
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
    info!("shutdown signal received");
}
