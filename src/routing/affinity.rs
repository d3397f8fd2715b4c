//! Session affinity cookie.
//!
//! The cookie value is the canonical address of the node a client was last
//! balanced to. Nothing is stored server-side.

use axum::http::header::{InvalidHeaderValue, COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::load_balancer::Node;

/// Name of the affinity cookie.
pub const COOKIE_NAME: &str = "session";

/// Client-held pointer to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffinityToken {
    target: String,
}

impl AffinityToken {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }

    /// Token bound to the given node.
    pub fn for_node(node: &Node) -> Self {
        Self::new(node.address())
    }

    /// Address of the node this token points at.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Extract the `session` cookie from request headers, if any.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| name.trim() == COOKIE_NAME)
            .map(|(_, value)| Self::new(value.trim().trim_matches('"')))
    }

    /// `Set-Cookie` value issuing this token for the whole site.
    pub fn to_header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&format!("{}={}; Path=/", COOKIE_NAME, self.target))
    }
}
