// src/core/scanner/liveness.rs

use crate::core::models::Endpoint;
use crate::core::pool::run_pool;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info};

/// TCP-dials every endpoint on a pool of `concurrency` workers and returns the
/// reachable ones, in completion order. Unreachable endpoints are dropped
/// silently. Returns once every endpoint has been attempted.
pub async fn probe(endpoints: Vec<Endpoint>, concurrency: usize, dial_timeout: Duration) -> Vec<Endpoint> {
    let total = endpoints.len();
    info!(total, concurrency, "Starting liveness probe.");

    let outcomes = run_pool(endpoints, concurrency, concurrency, move |endpoint: Endpoint| async move {
        is_reachable(&endpoint, dial_timeout).await.then_some(endpoint)
    })
    .await;

    let alive: Vec<Endpoint> = outcomes.into_iter().filter_map(|o| o.ok().flatten()).collect();
    info!(total, alive = alive.len(), "Liveness probe finished.");
    alive
}

/// Opens and immediately closes a TCP connection to the endpoint's host:port.
pub async fn is_reachable(endpoint: &Endpoint, dial_timeout: Duration) -> bool {
    let target = endpoint.authority();
    match timeout(dial_timeout, TcpStream::connect(&target)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            true
        }
        Ok(Err(e)) => {
            debug!(target = %target, error = %e, "Endpoint refused connection.");
            false
        }
        Err(_) => {
            debug!(target = %target, "Endpoint dial timed out.");
            false
        }
    }
}
