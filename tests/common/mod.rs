//! Shared utilities for integration tests.

use axum::{http::HeaderMap, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use sticky_lb::config::ProxyConfig;
use sticky_lb::http::HttpServer;
use sticky_lb::lifecycle::Shutdown;

/// Start a backend that answers every path with `identifier`.
///
/// A request carrying `x-echo-forwarded-for` gets its `x-forwarded-for` header back instead.
pub async fn start_mock_backend(identifier: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(move |headers: HeaderMap| async move {
        if headers.contains_key("x-echo-forwarded-for") {
            return headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string();
        }
        identifier.to_string()
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start a backend that waits `delay` before answering `"slow"`.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        "slow"
    });

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn backend_url(addr: SocketAddr) -> String {
    format!("http://{}", addr)
}

/// Start the proxy on an ephemeral port.
///
/// Keep the returned `Shutdown` alive for the duration of the test.
pub async fn start_proxy(config: ProxyConfig) -> (SocketAddr, Shutdown) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config).unwrap();
    tokio::spawn(server.run(listener, shutdown.subscribe()));

    (addr, shutdown)
}

pub fn config_for(backends: &[SocketAddr], probe_enabled: bool) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.backends = backends.iter().copied().map(backend_url).collect();
    config.health_check.enabled = probe_enabled;
    config.health_check.interval_secs = 1;
    config
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}
