//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the proxy handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Start the background health probe and the optional admin API
//! - Dispatch each request: select a node, forward, issue the affinity cookie

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header::SET_COOKIE, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin::{self, AdminState};
use crate::config::loader::ConfigError;
use crate::config::validation::{validate_config, ValidationError};
use crate::config::ProxyConfig;
use crate::health::HealthProbe;
use crate::http::forward::Forwarder;
use crate::http::request::{request_id, MakeRequestUuidV4};
use crate::load_balancer::Pool;
use crate::observability::metrics;
use crate::routing::{AffinityToken, Router as NodeRouter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<NodeRouter>,
    pub forwarder: Forwarder,
}

/// HTTP server for the load balancer.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    pool: Arc<Pool>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// The configuration is validated first; no partial pool is started.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;
        let pool = Arc::new(
            Pool::from_addresses(&config.backends)
                .map_err(|e| ConfigError::Validation(vec![ValidationError::InvalidBackend(e)]))?,
        );

        let state = AppState {
            router: Arc::new(NodeRouter::new(pool.clone())),
            forwarder: Forwarder::new(Duration::from_secs(config.timeouts.connect_secs)),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            pool,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(TimeoutLayer::with_status_code(
                StatusCode::GATEWAY_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV4))
    }

    /// Shared backend pool.
    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            nodes = self.pool.len(),
            "HTTP server starting"
        );

        if self.config.health_check.enabled {
            let probe = HealthProbe::new(self.pool.clone(), &self.config.health_check)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
            let handle = tokio::spawn(probe.run(shutdown.resubscribe()));
            tokio::spawn(async move {
                if let Err(e) = handle.await {
                    tracing::error!(error = %e, "Health probe task failed; node liveness is frozen");
                }
            });
        } else {
            tracing::info!("Health probe disabled");
        }

        if self.config.admin.enabled {
            let admin_listener = TcpListener::bind(&self.config.admin.bind_address).await?;
            let admin_state = AdminState::new(self.pool.clone(), &self.config.admin.api_key);
            let admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                if let Err(e) = admin::serve(admin_listener, admin_state, admin_shutdown).await {
                    tracing::error!(error = %e, "Admin server failed");
                }
            });
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Selects a node, forwards the request, and issues the affinity cookie.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().to_string();

    let token = AffinityToken::from_headers(request.headers());
    let route = match state.router.route(token.as_ref()) {
        Ok(route) => route,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "No backend available");
            metrics::record_no_available_node();
            metrics::record_request(&method, 500, "none", start_time);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response();
        }
    };

    let node = route.node().clone();
    if route.is_sticky() {
        metrics::record_affinity_hit();
    }
    tracing::info!(
        request_id = %request_id,
        backend = %node.address(),
        sticky = route.is_sticky(),
        "Routing request"
    );

    let mut response = match state.forwarder.forward(&node, request, client_addr).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %node.address(), error = %e, "Upstream error");
            if e.is_connect() {
                // Skipped by selection until the probe sees it again.
                node.set_alive(false);
            }
            (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
        }
    };

    if let Some(token) = route.issued_token() {
        match token.to_header_value() {
            Ok(cookie) => {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "Cannot encode affinity cookie");
            }
        }
    }

    metrics::record_request(&method, response.status().as_u16(), node.address(), start_time);
    response
}
