//! REST API.
//!
//! `/health` is always open; everything under `/api` sits behind the
//! optional password gate.

pub mod auth;
pub mod error;
mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tokio::net::TcpListener;

use crate::scheduler::Dispatcher;
use crate::service::BillService;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: BillService,
    pub dispatcher: Arc<Dispatcher>,
    /// Basic-auth password; `None` disables the gate.
    pub password: Option<Arc<str>>,
}

impl AppState {
    pub fn new(service: BillService, dispatcher: Arc<Dispatcher>, password: Option<&str>) -> Self {
        Self {
            service,
            dispatcher,
            password: password.map(Arc::from),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/bills",
            get(routes::list_bills).post(routes::create_bill),
        )
        .route(
            "/bills/{id}",
            get(routes::get_bill)
                .put(routes::update_bill)
                .delete(routes::delete_bill),
        )
        .route(
            "/settings",
            get(routes::get_settings).put(routes::update_settings),
        )
        .route("/notifications/trigger", post(routes::trigger_notifications))
        .route("/expenses", get(routes::expenses))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_password,
        ));

    Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .with_state(state)
}

/// Serve on `listener` until `shutdown` resolves, then drain open requests.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    if state.password.is_none() {
        tracing::warn!("no password configured, API is open to anyone who can reach it");
    }
    tracing::info!("billarr API listening on http://{local_addr}");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    tracing::info!("HTTP server stopped");
    Ok(())
}
