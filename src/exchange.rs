//! # Bidirectional mapping between container records and host properties.
//!
//! The exchanger owns the well-known property schema:
//!
//! ```text
//! executor:owner   identifies this node; scopes enumeration
//! executor:state   "reserved" | "initializing" | "created" | "running" | "completed"
//! executor:result  JSON {"Failed": bool, "FailureReason": string}
//! tag:<name>       user-facing tag value
//! ```
//!
//! It is stateless and safe for concurrent use.

use std::collections::HashMap;

use crate::container::{Container, ContainerState, RunResult, StepDef, Tags};
use crate::error::StoreError;
use crate::host::{HostClient, HostContainer, HostCreateSpec};

pub const OWNER_PROPERTY: &str = "executor:owner";
pub const STATE_PROPERTY: &str = "executor:state";
pub const RESULT_PROPERTY: &str = "executor:result";
pub const TAG_PROPERTY_PREFIX: &str = "tag:";

#[derive(Clone, Debug)]
pub struct Exchanger {
    owner_name: String,
    max_cpu_shares: u64,
    inode_limit: u64,
}

impl Exchanger {
    pub fn new(owner_name: impl Into<String>, max_cpu_shares: u64, inode_limit: u64) -> Self {
        Self {
            owner_name: owner_name.into(),
            max_cpu_shares,
            inode_limit,
        }
    }

    /// Translates a record into host-create arguments.
    pub fn host_spec(&self, container: &Container) -> Result<HostCreateSpec, StoreError> {
        let mut properties = HashMap::new();
        properties.insert(OWNER_PROPERTY.to_string(), self.owner_name.clone());
        properties.insert(STATE_PROPERTY.to_string(), container.state.to_string());
        properties.insert(
            RESULT_PROPERTY.to_string(),
            serde_json::to_string(&container.run_result)?,
        );
        for (name, value) in &container.tags {
            properties.insert(format!("{TAG_PROPERTY_PREFIX}{name}"), value.clone());
        }

        Ok(HostCreateSpec {
            handle: container.guid.clone(),
            properties,
            env: container.env.clone(),
            memory_limit_mb: container.memory_limit_mb,
            disk_limit_mb: container.disk_limit_mb,
            inode_limit: self.inode_limit,
            cpu_shares: self.cpu_shares_for(container.cpu_weight),
            ports: container.ports.clone(),
        })
    }

    /// Materializes the record on the host and backfills the network
    /// coordinates the host assigned.
    pub async fn create(
        &self,
        host: &dyn HostClient,
        mut container: Container,
    ) -> Result<Container, StoreError> {
        let spec = self.host_spec(&container)?;
        let handle = host.create(spec).await?;
        let info = handle.info().await?;
        container.external_ip = info.external_ip;
        container.ports = info.ports;
        Ok(container)
    }

    /// Reconstitutes a record from host properties. Containers in any
    /// lifecycle state are accepted; missing or unparseable well-known
    /// properties yield [`StoreError::Malformed`].
    pub async fn from_host(&self, handle: &dyn HostContainer) -> Result<Container, StoreError> {
        let guid = handle.guid().to_string();
        let info = handle.info().await?;

        let state_raw = info.properties.get(STATE_PROPERTY).ok_or_else(|| {
            StoreError::Malformed {
                guid: guid.clone(),
                reason: format!("missing property {STATE_PROPERTY}"),
            }
        })?;
        let state: ContainerState =
            state_raw
                .parse()
                .map_err(|reason: String| StoreError::Malformed {
                    guid: guid.clone(),
                    reason,
                })?;

        let result_raw = info.properties.get(RESULT_PROPERTY).ok_or_else(|| {
            StoreError::Malformed {
                guid: guid.clone(),
                reason: format!("missing property {RESULT_PROPERTY}"),
            }
        })?;
        let run_result: RunResult =
            serde_json::from_str(result_raw).map_err(|err| StoreError::Malformed {
                guid: guid.clone(),
                reason: format!("bad {RESULT_PROPERTY}: {err}"),
            })?;

        let mut tags = Tags::new();
        for (key, value) in &info.properties {
            if let Some(name) = key.strip_prefix(TAG_PROPERTY_PREFIX) {
                tags.insert(name.to_string(), value.clone());
            }
        }

        let mut container = Container::new(guid, StepDef::default());
        container.state = state;
        container.run_result = run_result;
        container.tags = tags;
        container.external_ip = info.external_ip;
        container.ports = info.ports;
        Ok(container)
    }

    /// The host-side filter for enumerating this node's containers,
    /// optionally narrowed by tags.
    pub fn list_filter(&self, tags: &Tags) -> HashMap<String, String> {
        let mut filter = HashMap::new();
        filter.insert(OWNER_PROPERTY.to_string(), self.owner_name.clone());
        for (name, value) in tags {
            filter.insert(format!("{TAG_PROPERTY_PREFIX}{name}"), value.clone());
        }
        filter
    }

    fn cpu_shares_for(&self, weight: u64) -> u64 {
        if weight == 0 {
            return self.max_cpu_shares;
        }
        self.max_cpu_shares * weight.min(100) / 100
    }
}
