use axum::{extract::State, Json};
use serde::Serialize;

use super::AdminState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub nodes: usize,
    pub alive: usize,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub address: String,
    pub alive: bool,
    pub unhealthy: bool,
    pub weight: f64,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let alive = state.pool.alive_count();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if alive > 0 { "operational" } else { "degraded" },
        nodes: state.pool.len(),
        alive,
    })
}

/// Backends in current rotation order, heaviest first.
pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .pool
        .rotation_order()
        .iter()
        .map(|node| BackendStatus {
            address: node.address().to_string(),
            alive: node.is_alive(),
            unhealthy: node.is_unhealthy(),
            weight: node.weight(),
        })
        .collect();

    Json(statuses)
}
