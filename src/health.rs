//! # Periodic container-host health probing.
//!
//! A supervised task with two phases keyed off two timers: the probe
//! cadence (`check_interval`) and the per-probe deadline
//! (`check_timeout`).
//!
//! The initial probe decides whether the node comes up at all: an
//! unrecoverable failure or a deadline hit terminates the task without
//! ever signalling readiness. Otherwise readiness fires after the first
//! attempt, success or not, so the node supervisor can proceed while
//! the healthy flag tracks actual state.
//!
//! Publication is edge-triggered: at most one `set_healthy` call per
//! actual change, so downstream admission control is never flooded.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{HealthCheckError, HealthError};
use crate::supervised::{self, ReadySignal, Supervised};

/// Probes the container host once.
#[async_trait]
pub trait HealthChecker: Send + Sync + 'static {
    async fn healthcheck(&self) -> Result<(), HealthCheckError>;
}

/// Downstream admission gate. Calls arrive edge-triggered.
pub trait HealthSink: Send + Sync + 'static {
    fn set_healthy(&self, healthy: bool);
}

pub struct HealthSupervisor {
    checker: Arc<dyn HealthChecker>,
    sink: Arc<dyn HealthSink>,
    check_interval: Duration,
    check_timeout: Duration,
}

impl HealthSupervisor {
    pub fn new(
        checker: Arc<dyn HealthChecker>,
        sink: Arc<dyn HealthSink>,
        check_interval: Duration,
        check_timeout: Duration,
    ) -> Self {
        Self {
            checker,
            sink,
            check_interval,
            check_timeout,
        }
    }

    /// Spawns the supervisor. Cancelling the handle makes the task exit
    /// promptly with `Ok`.
    pub fn spawn(self) -> Supervised<HealthError> {
        supervised::spawn(move |token, ready| self.run(token, ready))
    }

    async fn run(self, token: CancellationToken, ready: ReadySignal) -> Result<(), HealthError> {
        tracing::debug!("health supervisor started");

        let probed = tokio::select! {
            _ = token.cancelled() => return Ok(()),
            probed = time::timeout(self.check_timeout, self.checker.healthcheck()) => probed,
        };
        let mut healthy = match probed {
            Ok(Ok(())) => {
                self.sink.set_healthy(true);
                true
            }
            Ok(Err(HealthCheckError::Unrecoverable { reason })) => {
                return Err(HealthError::Unrecoverable { reason });
            }
            Ok(Err(HealthCheckError::Recoverable { reason })) => {
                tracing::info!(%reason, "container host unhealthy at startup");
                self.sink.set_healthy(false);
                false
            }
            Err(_) => {
                return Err(HealthError::CheckTimeout {
                    timeout: self.check_timeout,
                });
            }
        };
        ready.notify();

        loop {
            tokio::select! {
                _ = token.cancelled() => return Ok(()),
                _ = time::sleep(self.check_interval) => {}
            }

            let probed = tokio::select! {
                _ = token.cancelled() => return Ok(()),
                probed = time::timeout(self.check_timeout, self.checker.healthcheck()) => probed,
            };
            let now_healthy = match probed {
                Ok(Ok(())) => true,
                Ok(Err(HealthCheckError::Unrecoverable { reason })) => {
                    tracing::error!(%reason, "container host permanently broken");
                    return Err(HealthError::Unrecoverable { reason });
                }
                Ok(Err(HealthCheckError::Recoverable { reason })) => {
                    tracing::info!(%reason, "container host unhealthy");
                    false
                }
                Err(_) => {
                    tracing::info!(timeout = ?self.check_timeout, "healthcheck timed out");
                    false
                }
            };

            if now_healthy != healthy {
                self.sink.set_healthy(now_healthy);
                healthy = now_healthy;
            }
        }
    }
}
