//! Read-only admin API.
//!
//! # Responsibilities
//! - Report pool liveness and per-node health
//! - Guard every route with a bearer API key
//!
//! # Design Decisions
//! - Served on its own listener so it never shares the proxy's catch-all route
//! - Never mutates the pool; selection state belongs to the proxy path

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::{get_backends, get_status};
use crate::load_balancer::Pool;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub pool: Arc<Pool>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(pool: Arc<Pool>, api_key: &str) -> Self {
        Self {
            pool,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/backends", get(get_backends))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
