use serde::{Deserialize, Serialize};

use crate::container::Container;

/// Lifecycle event delivered to subscribers.
///
/// Serializes as `{"Type": "container_running" | "container_complete",
/// "Container": <record>}`, the shape exposed to the event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type", content = "Container")]
pub enum Event {
    /// The container passed its readiness edge.
    #[serde(rename = "container_running")]
    ContainerRunning(Container),
    /// The container reached its terminal state.
    #[serde(rename = "container_complete")]
    ContainerComplete(Container),
}

impl Event {
    pub fn container(&self) -> &Container {
        match self {
            Event::ContainerRunning(c) | Event::ContainerComplete(c) => c,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Event::ContainerRunning(_) => "container_running",
            Event::ContainerComplete(_) => "container_complete",
        }
    }
}
