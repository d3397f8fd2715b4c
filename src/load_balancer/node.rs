//! Backend node abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track liveness (accepts connections) and slowness (answers late)
//! - Hold the weight used to order the rotation
//! - Probe reachability and responsiveness on behalf of the health probe

use axum::body::Body;
use axum::http::uri::Authority;
use axum::http::{header, Method, Request};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;
use url::Url;

use crate::load_balancer::LbError;

/// Deadline for the TCP reachability check.
pub const REACHABILITY_TIMEOUT: Duration = Duration::from_secs(1);

/// Deadline for the HTTP responsiveness check.
pub const RESPONSIVENESS_TIMEOUT: Duration = Duration::from_millis(200);

/// Weight of a node that answers within the responsiveness deadline.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Factor applied to the weight on every slow or failed responsiveness check.
pub const WEIGHT_DECAY: f64 = 0.9;

/// Floor for decayed weights. Keeps the weight strictly positive.
pub const MIN_WEIGHT: f64 = 1e-9;

/// HTTP client used for responsiveness checks.
pub type ProbeClient = Client<HttpConnector, Body>;

/// A single backend server.
#[derive(Debug)]
pub struct Node {
    /// Position in the configured backend list.
    index: usize,
    /// Canonical origin, e.g. `http://127.0.0.1:8081`. Also the affinity cookie value.
    address: String,
    /// `host:port` used to dial the backend.
    authority: Authority,

    alive: AtomicBool,
    unhealthy: AtomicBool,
    /// f64 bits.
    weight: AtomicU64,
}

impl Node {
    /// Parse a backend address into a node.
    ///
    /// Accepts `http://host[:port]` or a bare `host:port`. Other schemes are rejected.
    /// The node starts alive and healthy with the default weight.
    pub fn new(index: usize, raw: &str) -> Result<Self, LbError> {
        let trimmed = raw.trim();
        let candidate = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("http://{}", trimmed)
        };

        let url = Url::parse(&candidate).map_err(|e| LbError::address(raw, e))?;
        if url.scheme() != "http" {
            return Err(LbError::address(
                raw,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }
        let host = url
            .host_str()
            .ok_or_else(|| LbError::address(raw, "missing host"))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| LbError::address(raw, "missing port"))?;
        let authority = Authority::from_str(&format!("{}:{}", host, port))
            .map_err(|e| LbError::address(raw, e))?;

        Ok(Self {
            index,
            address: url.origin().ascii_serialization(),
            authority,
            alive: AtomicBool::new(true),
            unhealthy: AtomicBool::new(false),
            weight: AtomicU64::new(DEFAULT_WEIGHT.to_bits()),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Canonical origin of the backend.
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    // --- Liveness ---

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Last writer wins.
    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::Release);
    }

    /// Attempt a TCP connection to the backend.
    ///
    /// Opens and immediately drops one connection. Does not touch `alive`.
    pub async fn check_reachable(&self) -> bool {
        match time::timeout(
            REACHABILITY_TIMEOUT,
            TcpStream::connect(self.authority.as_str()),
        )
        .await
        {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::debug!(node = %self.address, error = %e, "Reachability check failed");
                false
            }
            Err(_) => {
                tracing::debug!(node = %self.address, "Reachability check timed out");
                false
            }
        }
    }

    // --- Responsiveness ---

    pub fn is_unhealthy(&self) -> bool {
        self.unhealthy.load(Ordering::Acquire)
    }

    pub fn weight(&self) -> f64 {
        f64::from_bits(self.weight.load(Ordering::Acquire))
    }

    /// Issue a lightweight GET and update weight and slowness from the outcome.
    ///
    /// Any response received within [`RESPONSIVENESS_TIMEOUT`] counts as fast,
    /// whatever its status. Returns whether the node was fast.
    pub async fn check_responsiveness(&self, client: &ProbeClient) -> bool {
        let request = match Request::builder()
            .method(Method::GET)
            .uri(format!("http://{}/", self.authority))
            .header(header::USER_AGENT, "sticky-lb-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!(node = %self.address, error = %e, "Failed to build responsiveness request");
                self.record_slow_response();
                return false;
            }
        };

        let fast = match time::timeout(RESPONSIVENESS_TIMEOUT, client.request(request)).await {
            Ok(Ok(_response)) => true,
            Ok(Err(e)) => {
                tracing::debug!(node = %self.address, error = %e, "Responsiveness check failed");
                false
            }
            Err(_) => {
                tracing::debug!(node = %self.address, "Responsiveness check timed out");
                false
            }
        };

        if fast {
            self.record_fast_response();
        } else {
            self.record_slow_response();
        }
        fast
    }

    /// Reset the weight and clear the unhealthy flag.
    pub fn record_fast_response(&self) {
        self.weight.store(DEFAULT_WEIGHT.to_bits(), Ordering::Release);
        self.unhealthy.store(false, Ordering::Release);
    }

    /// Decay the weight by [`WEIGHT_DECAY`] and mark the node unhealthy.
    /// Returns the new weight.
    pub fn record_slow_response(&self) -> f64 {
        let decay = |bits: u64| Some((f64::from_bits(bits) * WEIGHT_DECAY).max(MIN_WEIGHT).to_bits());
        let (Ok(previous) | Err(previous)) =
            self.weight
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, decay);
        self.unhealthy.store(true, Ordering::Release);
        (f64::from_bits(previous) * WEIGHT_DECAY).max(MIN_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper_util::rt::TokioExecutor;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn probe_client() -> ProbeClient {
        Client::builder(TokioExecutor::new()).build(HttpConnector::new())
    }

    /// Answers every connection with `200 OK` after `delay`.
    async fn start_responder(delay: Duration) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = socket.read(&mut buf).await;
                    tokio::time::sleep(delay).await;
                    let _ = socket
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok")
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        addr
    }

    async fn closed_port() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    }

    #[test]
    fn test_parse_addresses() {
        let node = Node::new(0, "http://127.0.0.1:8081").unwrap();
        assert_eq!(node.address(), "http://127.0.0.1:8081");
        assert_eq!(node.authority().as_str(), "127.0.0.1:8081");

        let bare = Node::new(1, "localhost:9000").unwrap();
        assert_eq!(bare.address(), "http://localhost:9000");

        let default_port = Node::new(2, "http://example.com/").unwrap();
        assert_eq!(default_port.address(), "http://example.com");
        assert_eq!(default_port.authority().as_str(), "example.com:80");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(Node::new(0, "https://example.com"), Err(LbError::AddressParse { .. })));
        assert!(matches!(Node::new(0, "http://"), Err(LbError::AddressParse { .. })));
        assert!(matches!(Node::new(0, "http://host:notaport"), Err(LbError::AddressParse { .. })));
        assert!(matches!(Node::new(0, ""), Err(LbError::AddressParse { .. })));
    }

    #[test]
    fn test_initial_state() {
        let node = Node::new(0, "127.0.0.1:8081").unwrap();
        assert!(node.is_alive());
        assert!(!node.is_unhealthy());
        assert_eq!(node.weight(), DEFAULT_WEIGHT);
    }

    #[test]
    fn test_set_alive() {
        let node = Node::new(0, "127.0.0.1:8081").unwrap();
        node.set_alive(false);
        assert!(!node.is_alive());
        node.set_alive(true);
        assert!(node.is_alive());
    }

    #[test]
    fn test_weight_decay_and_reset() {
        let node = Node::new(0, "127.0.0.1:8081").unwrap();

        let weight = node.record_slow_response();
        assert!((weight - 0.9).abs() < 1e-12);
        assert!((node.weight() - 0.9).abs() < 1e-12);
        assert!(node.is_unhealthy());

        node.record_slow_response();
        assert!((node.weight() - 0.81).abs() < 1e-12);

        node.record_fast_response();
        assert_eq!(node.weight(), DEFAULT_WEIGHT);
        assert!(!node.is_unhealthy());
    }

    #[test]
    fn test_weight_never_reaches_zero() {
        let node = Node::new(0, "127.0.0.1:8081").unwrap();
        for _ in 0..20_000 {
            node.record_slow_response();
        }
        assert!(node.weight() > 0.0);
        assert_eq!(node.weight(), MIN_WEIGHT);
    }

    #[tokio::test]
    async fn test_check_reachable() {
        let up = start_responder(Duration::ZERO).await;
        let node = Node::new(0, &up.to_string()).unwrap();
        assert!(node.check_reachable().await);

        let down = closed_port().await;
        let node = Node::new(1, &down.to_string()).unwrap();
        assert!(!node.check_reachable().await);
        // The check only reports; liveness is left to the caller.
        assert!(node.is_alive());
    }

    #[tokio::test]
    async fn test_check_responsiveness_slow_then_fast() {
        let client = probe_client();

        let slow = start_responder(Duration::from_millis(500)).await;
        let node = Node::new(0, &slow.to_string()).unwrap();
        assert!(!node.check_responsiveness(&client).await);
        assert!(node.is_unhealthy());
        assert!((node.weight() - 0.9).abs() < 1e-12);

        let fast = start_responder(Duration::ZERO).await;
        let node = Node::new(1, &fast.to_string()).unwrap();
        node.record_slow_response();
        assert!(node.check_responsiveness(&client).await);
        assert!(!node.is_unhealthy());
        assert_eq!(node.weight(), DEFAULT_WEIGHT);
    }
}
