//! # The consumed container-host facade.
//!
//! The host is the remote daemon that actually creates and runs OS-level
//! containers. It is a black box behind these traits; the store and the
//! exchanger never assume anything about it beyond this surface.
//!
//! Properties on a host container are the recovery source of truth: on
//! startup or reconcile the local view is rebuilt from them, filtered by
//! the owner property.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::container::{EnvVar, PortMapping};
use crate::error::HostError;

/// Streaming byte reader returned by [`HostContainer::stream_out`].
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Arguments for materializing one host container.
#[derive(Clone, Debug, Default)]
pub struct HostCreateSpec {
    /// Host-side handle; the store always uses the container guid.
    pub handle: String,
    pub properties: HashMap<String, String>,
    pub env: Vec<EnvVar>,
    pub memory_limit_mb: u64,
    pub disk_limit_mb: u64,
    pub inode_limit: u64,
    pub cpu_shares: u64,
    pub ports: Vec<PortMapping>,
}

/// Snapshot of a host container's observable state.
#[derive(Clone, Debug, Default)]
pub struct HostContainerInfo {
    pub properties: HashMap<String, String>,
    pub external_ip: String,
    pub ports: Vec<PortMapping>,
}

/// Arguments for spawning a process inside a host container.
#[derive(Clone, Debug, Default)]
pub struct HostProcessSpec {
    pub path: String,
    pub args: Vec<String>,
    pub env: Vec<EnvVar>,
}

/// A process running inside a host container.
#[async_trait]
pub trait HostProcess: Send {
    /// Blocks until the process exits and returns its exit status.
    async fn wait(&mut self) -> Result<i32, HostError>;
}

/// One container on the remote host.
#[async_trait]
pub trait HostContainer: Send + Sync {
    fn guid(&self) -> &str;

    async fn set_property(&self, key: &str, value: &str) -> Result<(), HostError>;
    async fn get_property(&self, key: &str) -> Result<String, HostError>;
    async fn info(&self) -> Result<HostContainerInfo, HostError>;

    /// Streams a file or directory out of the container.
    async fn stream_out(&self, source_path: &str) -> Result<ByteStream, HostError>;

    /// Spawns a process inside the container.
    async fn run(&self, spec: HostProcessSpec) -> Result<Box<dyn HostProcess>, HostError>;
}

/// The remote container host.
#[async_trait]
pub trait HostClient: Send + Sync {
    async fn create(&self, spec: HostCreateSpec) -> Result<Arc<dyn HostContainer>, HostError>;
    async fn lookup(&self, guid: &str) -> Result<Arc<dyn HostContainer>, HostError>;

    /// Containers whose properties match every entry of `filter`.
    async fn list(
        &self,
        filter: HashMap<String, String>,
    ) -> Result<Vec<Arc<dyn HostContainer>>, HostError>;

    async fn destroy(&self, guid: &str) -> Result<(), HostError>;
    async fn ping(&self) -> Result<(), HostError>;
}
