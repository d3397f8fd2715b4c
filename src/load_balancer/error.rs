//! Error definitions for node selection.

use thiserror::Error;

/// Errors produced while building the pool or selecting a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LbError {
    /// A configured backend address could not be parsed.
    #[error("invalid backend address '{address}': {reason}")]
    AddressParse { address: String, reason: String },

    /// The pool was built from an empty backend list.
    #[error("backend pool requires at least one node")]
    EmptyPool,

    /// Every node failed the liveness scan during a selection.
    #[error("no available node")]
    NoAvailableNode,
}

impl LbError {
    pub(crate) fn address(address: &str, reason: impl ToString) -> Self {
        LbError::AddressParse {
            address: address.to_string(),
            reason: reason.to_string(),
        }
    }
}
