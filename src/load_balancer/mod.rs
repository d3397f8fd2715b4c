//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Backend address list (startup)
//!     → node.rs (parse, one Node per backend)
//!     → pool.rs (fixed membership, weighted rotation + cursor)
//!
//! Per selection:
//!     → pool.rs re-sorts by weight
//!     → scan from cursor, at most one full cycle
//!     → first live node, or NoAvailableNode
//! ```
//!
//! # Design Decisions
//! - Membership is fixed after construction; only the rotation order changes
//! - Slow nodes are ranked lower, never removed from rotation
//! - Dead nodes are skipped, never selected while a live one exists

pub mod error;
pub mod node;
pub mod pool;

pub use error::LbError;
pub use node::Node;
pub use pool::Pool;
