//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → wait_for_signal returns
//!
//! Shutdown (shutdown.rs):
//!     trigger → proxy stops accepting, probe exits, admin API stops
//! ```
//!
//! # Design Decisions
//! - One broadcast channel fans the stop signal out to every task
//! - In-flight requests drain through axum's graceful shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
