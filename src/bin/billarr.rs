//! Billarr server binary.
//!
//! Usage: `billarr [--config <path>]`. Without `--config` the path comes from
//! `BILLARR_CONFIG` or the platform config directory.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use billarr::calendar::CalendarSync;
use billarr::channels::ChannelEndpoints;
use billarr::server::{self, AppState};
use billarr::{BillService, BillStore, BillarrConfig, Dispatcher, NotificationScheduler};

fn config_path_from_args() -> anyhow::Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let value = args.next().context("--config needs a path")?;
                path = Some(PathBuf::from(value));
            }
            other => {
                if let Some(value) = other.strip_prefix("--config=") {
                    path = Some(PathBuf::from(value));
                } else {
                    anyhow::bail!("unknown argument: {other}");
                }
            }
        }
    }
    Ok(path.unwrap_or_else(BillarrConfig::default_config_path))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("cannot listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("cannot listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config_path = config_path_from_args()?;
    let config = BillarrConfig::load(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    let store = Arc::new(
        BillStore::open(&config.database.path)
            .with_context(|| format!("opening database {}", config.database.path.display()))?,
    );
    tracing::info!("database ready at {}", config.database.path.display());

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("building HTTP client")?;

    let calendar = CalendarSync::from_config(&config.calendar, http.clone());
    let service = BillService::new(Arc::clone(&store), calendar);
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&store),
        ChannelEndpoints {
            telegram: config.telegram.clone(),
            whatsapp: config.whatsapp.clone(),
        },
        http,
    ));

    let mut scheduler = NotificationScheduler::new(
        Arc::clone(&dispatcher),
        Duration::from_secs(config.scheduler.interval_minutes * 60),
    );
    if config.scheduler.enabled {
        scheduler.start();
    } else {
        tracing::info!("notification scheduler disabled by config");
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    let state = AppState::new(service, dispatcher, config.server.effective_password());

    let served = server::serve(listener, state, shutdown_signal()).await;

    scheduler.stop().await;
    drop(store);
    tracing::info!("billarr shut down cleanly");
    served
}
