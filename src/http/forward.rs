//! Request forwarding to a selected node.
//!
//! # Responsibilities
//! - Rewrite the request URI to target the node
//! - Strip hop-by-hop headers in both directions
//! - Record the client address in `X-Forwarded-For`
//! - Stream request and response bodies without buffering

use axum::body::Body;
use axum::http::header::CONNECTION;
use axum::http::uri::{PathAndQuery, Scheme};
use axum::http::{HeaderMap, HeaderValue, Request, Uri, Version};
use axum::response::Response;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

use crate::load_balancer::Node;

const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that apply to a single connection and must not be forwarded.
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Errors raised while proxying a request.
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to build upstream URI: {0}")]
    InvalidUri(#[from] axum::http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl ForwardError {
    /// True when no connection to the node could be established.
    pub fn is_connect(&self) -> bool {
        matches!(self, ForwardError::Upstream(e) if e.is_connect())
    }
}

/// Pooled HTTP client that proxies requests to nodes.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpConnector, Body>,
}

impl Forwarder {
    pub fn new(connect_timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(connect_timeout));

        Self {
            client: Client::builder(TokioExecutor::new()).build(connector),
        }
    }

    /// Proxy `request` to `node` and return the node's response.
    pub async fn forward(
        &self,
        node: &Node,
        request: Request<Body>,
        client_addr: SocketAddr,
    ) -> Result<Response, ForwardError> {
        let (mut parts, body) = request.into_parts();
        parts.uri = upstream_uri(node, &parts.uri)?;
        parts.version = Version::HTTP_11;
        strip_hop_by_hop(&mut parts.headers);
        append_forwarded_for(&mut parts.headers, client_addr.ip());

        let response = self.client.request(Request::from_parts(parts, body)).await?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

fn upstream_uri(node: &Node, inbound: &Uri) -> Result<Uri, ForwardError> {
    let path_and_query = inbound
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Ok(Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(node.authority().clone())
        .path_and_query(path_and_query)
        .build()?)
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in `Connection` are hop-by-hop as well.
    let listed: Vec<String> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in &listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    // Multiple header lines form one comma-separated list, in order.
    let mut hops: Vec<String> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect();
    hops.push(client.to_string());

    if let Ok(value) = HeaderValue::from_str(&hops.join(", ")) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_uri() {
        let node = Node::new(0, "http://127.0.0.1:8081").unwrap();

        let uri = upstream_uri(&node, &"/api/items?page=2".parse().unwrap()).unwrap();
        assert_eq!(uri, "http://127.0.0.1:8081/api/items?page=2");

        let uri = upstream_uri(&node, &"http://lb.example.com/".parse().unwrap()).unwrap();
        assert_eq!(uri, "http://127.0.0.1:8081/");
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, x-private"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-private", HeaderValue::from_static("1"));
        headers.insert("upgrade", HeaderValue::from_static("websocket"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn test_forwarded_for() {
        let mut headers = HeaderMap::new();
        append_forwarded_for(&mut headers, "10.0.0.1".parse().unwrap());
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "10.0.0.1");

        append_forwarded_for(&mut headers, "10.0.0.2".parse().unwrap());
        assert_eq!(headers.get(X_FORWARDED_FOR).unwrap(), "10.0.0.1, 10.0.0.2");
    }

    #[test]
    fn test_forwarded_for_joins_every_line() {
        let mut headers = HeaderMap::new();
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        headers.append(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.2, 10.0.0.3"));

        append_forwarded_for(&mut headers, "10.0.0.4".parse().unwrap());

        let lines: Vec<_> = headers.get_all(X_FORWARDED_FOR).iter().collect();
        assert_eq!(lines, vec!["10.0.0.1, 10.0.0.2, 10.0.0.3, 10.0.0.4"]);
    }

    #[tokio::test]
    async fn test_connect_failure_is_reported() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let node = Node::new(0, &addr.to_string()).unwrap();
        let forwarder = Forwarder::new(Duration::from_secs(1));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let err = forwarder
            .forward(&node, request, "127.0.0.1:50000".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_connect());
    }
}
