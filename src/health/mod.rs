//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Background probe (probe.rs), every interval:
//!     → pool re-sorted by weight
//!     → TCP connect per node (1s)  → alive / dead
//!     → GET / per live node (200ms) → weight reset / decayed, healthy / unhealthy
//!
//! Request path (http::server):
//!     connection to a node refused → node marked dead until the next tick
//! ```
//!
//! # Design Decisions
//! - Liveness and slowness are separate signals; only liveness removes a node
//! - Probe errors become node state, never errors for callers
//! - The next tick is the only retry

pub mod probe;

pub use probe::HealthProbe;
