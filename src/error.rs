//! # Error types used by the store, the step tree, and the health supervisor.
//!
//! Four enums, split by which subsystem raises them:
//!
//! - [`StepError`]: failures of step-tree execution. `Canceled` is the
//!   cancel-attributable kind; combinators suppress it when it was caused
//!   by a sibling's cancel cascade.
//! - [`HostError`]: failures of the remote container host facade.
//! - [`StoreError`]: failures of container store operations.
//! - [`HealthError`] / [`HealthCheckError`]: terminal errors of the health
//!   supervisor and outcomes of individual probes. `Unrecoverable` means
//!   the node is permanently broken and must stop accepting work.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by step execution.
///
/// A step returning `Canceled` acknowledges a cancel request; everything
/// else is a genuine failure and ends up in the container's run result.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// The step observed a cancel request and stopped.
    #[error("step canceled")]
    Canceled,

    /// The step ran and failed.
    #[error("{reason}")]
    Failed { reason: String },

    /// The monitored workload never passed its first liveness probe within
    /// the configured window.
    #[error("startup timeout")]
    StartupTimeout { timeout: Duration },

    /// Composite outcome of a codependent group: the primary cause plus any
    /// sibling failures that were not part of the cancel cascade.
    #[error("{primary} (and {} collateral step failures)", .secondary.len())]
    Aggregate {
        primary: Box<StepError>,
        secondary: Vec<StepError>,
    },
}

impl StepError {
    pub fn failed(reason: impl Into<String>) -> Self {
        StepError::Failed {
            reason: reason.into(),
        }
    }

    /// True when this error only reflects an acknowledged cancel request.
    pub fn is_cancel(&self) -> bool {
        matches!(self, StepError::Canceled)
    }
}

/// Errors surfaced by the remote container host.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("container not found")]
    NotFound,

    /// Transport-level failure; the host could not be reached at all.
    #[error("container host unavailable: {reason}")]
    Unavailable { reason: String },

    /// The host was reachable but refused or failed the operation.
    #[error("container host operation failed: {reason}")]
    Failed { reason: String },
}

/// Errors returned by [`ContainerStore`](crate::ContainerStore) operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// The referenced container is absent from the host or the tracker.
    #[error("container not found")]
    NotFound,

    /// The container is not in the state the operation requires.
    #[error("invalid state transition")]
    InvalidTransition,

    /// A host container is missing or carries unparseable well-known
    /// properties. Listing skips such containers instead of aborting.
    #[error("malformed container {guid}: {reason}")]
    Malformed { guid: String, reason: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error("encoding run result: {0}")]
    ResultEncoding(#[from] serde_json::Error),
}

/// Outcome of a single health probe against the container host.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealthCheckError {
    /// The probe failed but a later probe may succeed.
    #[error("healthcheck failed: {reason}")]
    Recoverable { reason: String },

    /// The node is permanently broken; the health supervisor terminates.
    #[error("unrecoverable: {reason}")]
    Unrecoverable { reason: String },
}

/// Terminal errors of the health supervisor task.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HealthError {
    #[error("unrecoverable: {reason}")]
    Unrecoverable { reason: String },

    /// A probe exceeded its deadline during the initial phase.
    #[error("healthcheck timed out after {timeout:?}")]
    CheckTimeout { timeout: Duration },
}
