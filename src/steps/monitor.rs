//! # Liveness monitor for a running container.
//!
//! Wraps a probe step and produces a step whose `perform` blocks until
//! the workload is declared failed, cancel fires, or the startup window
//! closes without a single successful probe.
//!
//! The pre-ready phase tolerates slow boot: probes run at
//! `unhealthy_interval` until the first success, bounded by
//! `start_timeout`. The post-ready phase is strict: the first probe
//! failure is terminal. The readiness edge is delivered exactly once,
//! through a one-shot channel observed by the step process.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use super::{Step, StepRef};
use crate::error::StepError;

pub struct MonitorStep {
    probe: StepRef,
    ready: Mutex<Option<oneshot::Sender<()>>>,
    start_timeout: Duration,
    healthy_interval: Duration,
    unhealthy_interval: Duration,
    canceled: CancellationToken,
}

impl MonitorStep {
    /// `start_timeout` of zero means no readiness deadline.
    pub fn new(
        probe: StepRef,
        ready: oneshot::Sender<()>,
        start_timeout: Duration,
        healthy_interval: Duration,
        unhealthy_interval: Duration,
    ) -> Self {
        Self {
            probe,
            ready: Mutex::new(Some(ready)),
            start_timeout,
            healthy_interval,
            unhealthy_interval,
            canceled: CancellationToken::new(),
        }
    }

    fn fire_ready(&self) {
        let sender = match self.ready.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(tx) = sender {
            let _ = tx.send(());
        }
    }
}

#[async_trait]
impl Step for MonitorStep {
    async fn perform(&self) -> Result<(), StepError> {
        let deadline =
            (self.start_timeout > Duration::ZERO).then(|| Instant::now() + self.start_timeout);
        let mut started = false;
        let mut interval = self.unhealthy_interval;

        loop {
            tokio::select! {
                _ = self.canceled.cancelled() => return Err(StepError::Canceled),
                _ = startup_deadline(deadline), if !started => {
                    return Err(StepError::StartupTimeout { timeout: self.start_timeout });
                }
                _ = time::sleep(interval) => {}
            }

            let mut attempt = self.probe.perform();
            let outcome = tokio::select! {
                res = &mut attempt => res,
                _ = self.canceled.cancelled() => {
                    // Aborts the in-flight probe; dropping the future is the abort.
                    self.probe.cancel();
                    return Err(StepError::Canceled);
                }
                _ = startup_deadline(deadline), if !started => {
                    self.probe.cancel();
                    return Err(StepError::StartupTimeout { timeout: self.start_timeout });
                }
            };

            match outcome {
                Ok(()) => {
                    if !started {
                        started = true;
                        interval = self.healthy_interval;
                        self.fire_ready();
                    }
                }
                // Unhealthy after readiness: terminal.
                Err(err) if started => return Err(err),
                Err(err) => {
                    tracing::debug!(error = %err, "probe failed before readiness; still waiting");
                }
            }
        }
    }

    fn cancel(&self) {
        self.canceled.cancel();
    }
}

async fn startup_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
