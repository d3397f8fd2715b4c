//! Backend pool management.
//!
//! # Responsibilities
//! - Own the fixed set of nodes built at startup
//! - Keep the rotation order (sorted by weight) and the round-robin cursor
//! - Select the next live node, skipping dead ones
//!
//! # Concurrency
//! Order and cursor share one mutex. Sorting, scanning and advancing all happen
//! with it held, so a re-sort can never land in the middle of a scan. The lock
//! is never held across an await point. Per-node state is atomic and is read
//! without the pool lock.

use std::cmp::Reverse;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::load_balancer::{LbError, Node};

/// Fixed set of backends plus the weighted round-robin rotation.
#[derive(Debug)]
pub struct Pool {
    /// Members in configured order. Never reordered.
    nodes: Vec<Arc<Node>>,
    rotation: Mutex<Rotation>,
}

#[derive(Debug)]
struct Rotation {
    order: Vec<Arc<Node>>,
    cursor: usize,
}

impl Rotation {
    fn advance(&mut self) -> usize {
        self.cursor = (self.cursor + 1) % self.order.len();
        self.cursor
    }

    /// Descending weight, ties broken by configured position.
    fn sort_by_weight(&mut self) {
        // Weights are strictly positive, so their bit patterns sort like the values.
        // Keys are cached so concurrent weight updates cannot skew the comparison.
        self.order
            .sort_by_cached_key(|node| (Reverse(node.weight().to_bits()), node.index()));
    }
}

impl Pool {
    /// Build a pool from backend address strings, in order.
    ///
    /// Fails on the first malformed address; no partial pool is returned.
    pub fn from_addresses<S: AsRef<str>>(addresses: &[S]) -> Result<Self, LbError> {
        let nodes = addresses
            .iter()
            .enumerate()
            .map(|(index, raw)| Node::new(index, raw.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_nodes(nodes)
    }

    /// Build a pool from already constructed nodes.
    pub fn from_nodes(nodes: Vec<Node>) -> Result<Self, LbError> {
        if nodes.is_empty() {
            return Err(LbError::EmptyPool);
        }
        let nodes: Vec<Arc<Node>> = nodes.into_iter().map(Arc::new).collect();

        tracing::debug!(nodes = nodes.len(), "Backend pool created");

        Ok(Self {
            rotation: Mutex::new(Rotation {
                order: nodes.clone(),
                cursor: 0,
            }),
            nodes,
        })
    }

    fn lock_rotation(&self) -> MutexGuard<'_, Rotation> {
        self.rotation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All members, in configured order.
    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: construction rejects empty pools.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alive_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_alive()).count()
    }

    /// Current cursor position into the rotation.
    pub fn cursor(&self) -> usize {
        self.lock_rotation().cursor
    }

    /// Snapshot of the current rotation order.
    pub fn rotation_order(&self) -> Vec<Arc<Node>> {
        self.lock_rotation().order.clone()
    }

    /// Move the cursor one step and return the new position.
    pub fn advance_cursor(&self) -> usize {
        self.lock_rotation().advance()
    }

    /// Re-sort the rotation by descending weight.
    pub fn reorder(&self) {
        self.lock_rotation().sort_by_weight();
    }

    /// Look up a member by its canonical address.
    ///
    /// Linear scan over the fixed member list; does not take the pool lock.
    pub fn find(&self, address: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|node| node.address() == address)
    }

    /// Select the next live node in weighted round-robin order.
    ///
    /// Examines at most one full cycle, advancing the cursor once per candidate.
    /// Dead candidates are confirmed dead on the way.
    pub fn next_healthy_node(&self) -> Result<Arc<Node>, LbError> {
        let mut rotation = self.lock_rotation();
        rotation.sort_by_weight();

        for _ in 0..rotation.order.len() {
            let node = Arc::clone(&rotation.order[rotation.cursor]);
            rotation.advance();
            if node.is_alive() {
                return Ok(node);
            }
            node.set_alive(false);
            tracing::debug!(node = %node.address(), "Skipping dead node");
        }

        Err(LbError::NoAvailableNode)
    }
}
