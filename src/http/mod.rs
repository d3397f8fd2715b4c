//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID)
//!     → [routing layer picks a node]
//!     → forward.rs (rewrite, strip hop-by-hop, stream to node)
//!     → server.rs (attach affinity cookie)
//!     → Send to client
//! ```

pub mod forward;
pub mod request;
pub mod server;

pub use forward::{ForwardError, Forwarder};
pub use request::X_REQUEST_ID;
pub use server::HttpServer;
