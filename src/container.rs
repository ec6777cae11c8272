//! # The container record: the node's internal view of one workload.
//!
//! The record is a cache of what the remote host knows; the authoritative
//! copy of `state`, `run_result`, and `tags` lives as properties on the
//! host container (see [`exchange`](crate::exchange)). Everything else is
//! supplied by the upstream scheduler when the container is accepted and
//! is not persisted.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// User-facing tags, stored on the host under a reserved property prefix.
pub type Tags = HashMap<String, String>;

/// Opaque action-node tree. The store never interprets these; the injected
/// [`StepBuilder`](crate::StepBuilder) turns them into runnable steps.
pub type StepDef = serde_json::Value;

/// Lifecycle state of a container. Transitions are monotone within one
/// lifecycle; any out-of-order transition is an invariant violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Reserved,
    Initializing,
    Created,
    Running,
    Completed,
}

impl ContainerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Reserved => "reserved",
            ContainerState::Initializing => "initializing",
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Completed => "completed",
        }
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(ContainerState::Reserved),
            "initializing" => Ok(ContainerState::Initializing),
            "created" => Ok(ContainerState::Created),
            "running" => Ok(ContainerState::Running),
            "completed" => Ok(ContainerState::Completed),
            other => Err(format!("unknown container state `{other}`")),
        }
    }
}

/// Terminal outcome of a container run. Set exactly once, on the
/// transition to `Completed`. The serialized names are part of the host
/// property contract and must not change.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    #[serde(rename = "Failed")]
    pub failed: bool,
    #[serde(rename = "FailureReason")]
    pub failure_reason: String,
}

/// Identifies the log stream emitted lines are tagged with.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogDescriptor {
    pub guid: String,
    pub source_name: String,
    pub index: Option<u32>,
}

/// One host-port binding for the container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    pub host_port: u16,
}

/// One environment variable injected into container processes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

/// The internal view of one workload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Stable identifier assigned by the caller; primary key.
    pub guid: String,
    pub state: ContainerState,

    /// The user workload.
    pub action: StepDef,
    /// Runs before the action; must succeed for the action to start.
    pub setup: Option<StepDef>,
    /// Liveness probe definition. Absent means the container counts as
    /// started the moment it runs.
    pub monitor: Option<StepDef>,

    /// Window in which the first successful probe must occur.
    /// Zero means no readiness deadline.
    pub start_timeout: Duration,

    pub log: LogDescriptor,
    pub external_ip: String,
    pub ports: Vec<PortMapping>,
    pub tags: Tags,

    pub memory_limit_mb: u64,
    pub disk_limit_mb: u64,
    /// Relative CPU weight in percent of the node's share cap; 0 means
    /// the full cap.
    pub cpu_weight: u64,
    pub env: Vec<EnvVar>,

    pub run_result: RunResult,
}

impl Container {
    /// A fresh record in `Initializing`, as handed over by the upstream
    /// scheduler on accept.
    pub fn new(guid: impl Into<String>, action: StepDef) -> Self {
        Self {
            guid: guid.into(),
            state: ContainerState::Initializing,
            action,
            setup: None,
            monitor: None,
            start_timeout: Duration::ZERO,
            log: LogDescriptor::default(),
            external_ip: String::new(),
            ports: Vec::new(),
            tags: Tags::new(),
            memory_limit_mb: 0,
            disk_limit_mb: 0,
            cpu_weight: 0,
            env: Vec::new(),
            run_result: RunResult::default(),
        }
    }
}
