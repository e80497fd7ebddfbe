use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use marketplace_api::{
    config, create_router,
    db::{establish_connection_from_app_config, run_migrations},
    events, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = config::load_config().context("failed to load configuration")?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    let db = Arc::new(
        establish_connection_from_app_config(&cfg)
            .await
            .context("failed to connect to the database")?,
    );

    if cfg.auto_migrate {
        info!("running database migrations");
        run_migrations(&db).await.context("migration failed")?;
    }

    let (event_sender, event_rx) = events::event_channel(1024);
    let event_loop = tokio::spawn(events::process_events(event_rx));

    let addr = format!("{}:{}", cfg.host, cfg.port);
    let state = AppState::new(db, cfg, Some(Arc::new(event_sender)));
    let app = create_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped, draining events");
    event_loop.abort();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => error!("failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received");
}
