//! # The step contract and its combinators.
//!
//! A [`Step`] is one unit of work inside a container with a uniform
//! perform/cancel contract. Steps compose into trees:
//!
//! ```text
//! Serial(
//!     Setup?,                       // runs first, must succeed
//!     Codependent(
//!         Action,                   // user workload
//!         Monitor(Probe)?,          // liveness; readiness fires at t=0 if absent
//!     ),
//! )
//! ```
//!
//! Cancel is a request, not a kill: it propagates top-down and each step
//! acknowledges by returning from `perform`.

mod codependent;
mod monitor;
mod runner;
mod serial;

pub use codependent::CodependentStep;
pub use monitor::MonitorStep;
pub use runner::ActionRunner;
pub use serial::SerialStep;

use std::sync::Arc;

use async_trait::async_trait;

use crate::container::{LogDescriptor, PortMapping, StepDef};
use crate::error::StepError;
use crate::host::HostContainer;

/// One unit of work with a uniform perform/cancel contract.
///
/// `perform` blocks until the work finishes, fails, or observes a cancel
/// request. `cancel` is idempotent, non-blocking, and safe to call
/// before, during, or after `perform`; it is a request to abort, not a
/// guarantee of immediacy.
#[async_trait]
pub trait Step: Send + Sync {
    async fn perform(&self) -> Result<(), StepError>;
    fn cancel(&self);
}

/// Shared handle to a step.
pub type StepRef = Arc<dyn Step>;

/// Turns opaque action-node definitions into runnable steps bound to a
/// host container. Concrete step implementations live behind this seam.
pub trait StepBuilder: Send + Sync {
    fn step_for(
        &self,
        def: &StepDef,
        container: &Arc<dyn HostContainer>,
        log: &LogDescriptor,
        external_ip: &str,
        ports: &[PortMapping],
    ) -> StepRef;
}
