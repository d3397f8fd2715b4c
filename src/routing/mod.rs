//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (cookie header)
//!     → affinity.rs (extract session token)
//!     → router.rs
//!         AFFINITY_LOOKUP → AFFINITY_HIT                    (routed, no new token)
//!                         → ROUND_ROBIN → SELECTED          (routed, token issued)
//!                                       → EXHAUSTED         (NoAvailableNode)
//! ```
//!
//! # Design Decisions
//! - No server-side session table; the cookie carries the node address
//! - A stale or unknown cookie is ignored, never an error

pub mod affinity;
pub mod router;

pub use affinity::{AffinityToken, COOKIE_NAME};
pub use router::{Route, Router};
