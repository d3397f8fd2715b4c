//! Background health probing.
//!
//! # Responsibilities
//! - Periodically re-sort the pool by weight
//! - Probe every node for reachability, then responsiveness
//! - Publish one log record and one set of gauges per node per tick

use futures_util::future::join_all;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, MissedTickBehavior};

use crate::config::validation::ValidationError;
use crate::config::HealthCheckConfig;
use crate::load_balancer::node::ProbeClient;
use crate::load_balancer::{Node, Pool};
use crate::observability::metrics;

pub struct HealthProbe {
    pool: Arc<Pool>,
    interval: Duration,
    client: ProbeClient,
}

impl HealthProbe {
    pub fn new(pool: Arc<Pool>, config: &HealthCheckConfig) -> Result<Self, ValidationError> {
        Self::with_interval(pool, Duration::from_secs(config.interval_secs))
    }

    /// Fails on a zero interval, which the ticker cannot run with.
    pub fn with_interval(pool: Arc<Pool>, interval: Duration) -> Result<Self, ValidationError> {
        if interval.is_zero() {
            return Err(ValidationError::ZeroProbeInterval);
        }
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            pool,
            interval,
            client,
        })
    }

    /// Tick until shutdown. The first tick fires immediately.
    ///
    /// A tick in progress always runs to completion; shutdown is observed between ticks.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = ?self.interval,
            nodes = self.pool.len(),
            "Health probe starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health probe received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One probe round over every node.
    pub async fn tick(&self) {
        self.pool.reorder();
        join_all(self.pool.nodes().iter().map(|node| self.probe(node))).await;
    }

    async fn probe(&self, node: &Node) {
        let alive = node.check_reachable().await;
        node.set_alive(alive);

        if alive {
            node.check_responsiveness(&self.client).await;
            let health = if node.is_unhealthy() { "unhealthy" } else { "healthy" };
            tracing::info!(
                node = %node.address(),
                status = "up",
                health,
                weight = node.weight(),
                "Health check"
            );
        } else {
            tracing::info!(node = %node.address(), status = "down", "Health check");
        }

        metrics::record_node_health(node);
    }
}
