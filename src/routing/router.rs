//! Per-request node selection.
//!
//! # Responsibilities
//! - Honor the affinity cookie when it names a live node
//! - Otherwise fall through to weighted round-robin with failover
//! - Issue a fresh affinity token on every balanced selection
//!
//! # Design Decisions
//! - Affinity lookup reads node state only; it never takes the pool lock
//! - Exactly one selection attempt per request; exhaustion is terminal

use std::sync::Arc;

use crate::load_balancer::{LbError, Node, Pool};
use crate::routing::affinity::AffinityToken;

/// Outcome of a successful selection.
#[derive(Debug, Clone)]
pub enum Route {
    /// The affinity cookie named a live node.
    Sticky(Arc<Node>),
    /// Chosen by round-robin; the client should be handed `token`.
    Balanced { node: Arc<Node>, token: AffinityToken },
}

impl Route {
    pub fn node(&self) -> &Arc<Node> {
        match self {
            Route::Sticky(node) => node,
            Route::Balanced { node, .. } => node,
        }
    }

    /// Token to send back to the client, if this selection issued one.
    pub fn issued_token(&self) -> Option<&AffinityToken> {
        match self {
            Route::Sticky(_) => None,
            Route::Balanced { token, .. } => Some(token),
        }
    }

    pub fn is_sticky(&self) -> bool {
        matches!(self, Route::Sticky(_))
    }
}

/// Selects a backend for each request.
#[derive(Debug)]
pub struct Router {
    pool: Arc<Pool>,
}

impl Router {
    pub fn new(pool: Arc<Pool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<Pool> {
        &self.pool
    }

    /// Pick the backend for one request.
    pub fn route(&self, token: Option<&AffinityToken>) -> Result<Route, LbError> {
        if let Some(token) = token {
            match self.pool.find(token.target()) {
                Some(node) if node.is_alive() => return Ok(Route::Sticky(Arc::clone(node))),
                Some(_) => {
                    tracing::debug!(cookie = %token.target(), "Affinity node is down, rebalancing");
                }
                None => {
                    tracing::debug!(cookie = %token.target(), "Affinity cookie names no known node");
                }
            }
        }

        let node = self.pool.next_healthy_node()?;
        let token = AffinityToken::for_node(&node);
        Ok(Route::Balanced { node, token })
    }
}
