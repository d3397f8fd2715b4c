//! Sticky-session HTTP load balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ routing::Router ──▶ load_balancer::Pool
//!                          │                 │ (session cookie)      │
//!                          │                 ▼                       │
//!                          │           http::forward ──────────────▶ Backend
//!     Client Response      │                 │
//!     ◀──────────────── Set-Cookie ◀─────────┘
//!
//!     health::HealthProbe ── every interval ──▶ reorder + probe every node
//! ```
//!
//! Cross-cutting: `config`, `observability`, `lifecycle`, `admin`.

// Core subsystems
pub mod config;
pub mod http;
pub mod routing;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{LbError, Node, Pool};
pub use routing::Router;
