//! # Store and supervisor configuration.
//!
//! One struct carries the full construction surface: owner scoping,
//! resource caps, monitor cadence, reconcile cadence, and healthcheck
//! timing.

use std::time::Duration;

/// Configuration for the container store and its supervised tasks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Value of the owner property stamped on every container this node
    /// creates; enumeration is scoped to it.
    pub owner_name: String,
    /// CPU shares granted to a container with `cpu_weight = 100`.
    pub max_cpu_shares: u64,
    /// Inode limit applied to every container's disk quota.
    pub inode_limit: u64,
    /// Probe cadence once a container has passed its readiness edge.
    pub healthy_monitoring_interval: Duration,
    /// Probe cadence before the readiness edge.
    pub unhealthy_monitoring_interval: Duration,
    /// How often the tracker is reconciled against the host.
    pub reconcile_interval: Duration,
    /// Host healthcheck cadence in steady state.
    pub healthcheck_interval: Duration,
    /// Deadline for one host healthcheck probe.
    pub healthcheck_timeout: Duration,
}

impl Default for Config {
    /// Defaults:
    /// - `owner_name = "executor"`
    /// - `max_cpu_shares = 1024`
    /// - `inode_limit = 200_000`
    /// - `healthy_monitoring_interval = 30s`
    /// - `unhealthy_monitoring_interval = 500ms`
    /// - `reconcile_interval = 30s`
    /// - `healthcheck_interval = 30s`
    /// - `healthcheck_timeout = 10s`
    fn default() -> Self {
        Self {
            owner_name: "executor".to_string(),
            max_cpu_shares: 1024,
            inode_limit: 200_000,
            healthy_monitoring_interval: Duration::from_secs(30),
            unhealthy_monitoring_interval: Duration::from_millis(500),
            reconcile_interval: Duration::from_secs(30),
            healthcheck_interval: Duration::from_secs(30),
            healthcheck_timeout: Duration::from_secs(10),
        }
    }
}
