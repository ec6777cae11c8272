//! # stevedore
//!
//! **Stevedore** is the container execution core of a distributed-task
//! executor node. It accepts container specifications from an upstream
//! scheduler, materializes them on a remote container host, runs a
//! user-defined action sequence inside each container, monitors the
//! workload for readiness and liveness, reports lifecycle events, and
//! guarantees resource cleanup on stop, failure, or node shutdown.
//!
//! | Area | Description | Key types / traits |
//! |------|-------------|--------------------|
//! | **Steps** | Uniform perform/cancel primitive and its combinators. | [`Step`], [`SerialStep`], [`CodependentStep`], [`MonitorStep`] |
//! | **Store** | Create / Lookup / List / Run / Stop / Destroy over the host; owns the running-process table. | [`ContainerStore`] |
//! | **Exchange** | Bidirectional record ⇄ host-property mapping. | [`Exchanger`] |
//! | **Events** | Fan-out of lifecycle events to bounded subscriber inboxes. | [`Emitter`], [`Subscribe`], [`Event`] |
//! | **Health** | Periodic host probing with edge-triggered signalling. | [`HealthSupervisor`], [`HealthChecker`], [`HealthSink`] |
//! | **Supervision** | Cancel/ready/wait handles for long-running tasks. | [`Supervised`], [`spawn_supervised`] |
//! | **Host facade** | The consumed remote container host. | [`HostClient`], [`HostContainer`] |
//!
//! ## Architecture
//!
//! ```text
//!  scheduler ──► ContainerStore ──create──► Exchanger ──► HostClient
//!                     │   │
//!                     │   └─run─► step process (supervised)
//!                     │              Serial(Setup?, Codependent(Action, Monitor?))
//!                     │              │ readiness ──► state=running ──► Emitter
//!                     │              └ completion ─► state=completed ─► Emitter
//!                     ├── Tracker ◄── reconciler (supervised, periodic)
//!                     └── HealthSupervisor ──► HealthSink (admission gate)
//! ```
//!
//! Authoritative state lives as properties on the host containers; the
//! local tracker is a cache rebuilt from the host, filtered by owner.
//! Cancellation is cooperative everywhere: a cancel is a request that
//! tasks acknowledge by returning, never a kill.

mod config;
mod container;
mod emitter;
mod error;
mod event;
mod exchange;
mod health;
mod host;
mod steps;
mod store;
mod supervised;
mod tracker;

pub use config::Config;
pub use container::{
    Container, ContainerState, EnvVar, LogDescriptor, PortMapping, RunResult, StepDef, Tags,
};
pub use emitter::{Emitter, Subscribe};
pub use error::{HealthCheckError, HealthError, HostError, StepError, StoreError};
pub use event::Event;
pub use exchange::{
    Exchanger, OWNER_PROPERTY, RESULT_PROPERTY, STATE_PROPERTY, TAG_PROPERTY_PREFIX,
};
pub use health::{HealthChecker, HealthSink, HealthSupervisor};
pub use host::{
    ByteStream, HostClient, HostContainer, HostContainerInfo, HostCreateSpec, HostProcess,
    HostProcessSpec,
};
pub use steps::{
    ActionRunner, CodependentStep, MonitorStep, SerialStep, Step, StepBuilder, StepRef,
};
pub use store::ContainerStore;
pub use supervised::{spawn as spawn_supervised, ReadySignal, Supervised};
pub use tracker::{InitializedTracker, Tracker};
