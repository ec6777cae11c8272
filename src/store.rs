//! # The container store: lifecycle operations over the remote host.
//!
//! Owns the running-process table (guid → supervised step process) and
//! drives every state transition. `run` builds the step tree
//!
//! ```text
//! Serial(Setup?, Codependent(Action, Monitor(Probe)?))
//! ```
//!
//! and spawns a supervised task that multiplexes three sources: the
//! caller's cancel signal, the one-shot readiness edge, and the
//! step-tree completion. All further transitions happen inside that
//! task; errors there are recorded in the container's run result and
//! surfaced only through the completion event and host properties.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::container::{Container, ContainerState, RunResult, Tags};
use crate::emitter::Emitter;
use crate::error::{HostError, StepError, StoreError};
use crate::event::Event;
use crate::exchange::{Exchanger, RESULT_PROPERTY, STATE_PROPERTY};
use crate::host::{ByteStream, HostClient, HostContainer};
use crate::steps::{
    ActionRunner, CodependentStep, SerialStep, Step, StepBuilder, StepRef, MonitorStep,
};
use crate::supervised::{self, ReadySignal, Supervised};
use crate::tracker::InitializedTracker;

pub struct ContainerStore {
    host: Arc<dyn HostClient>,
    exchanger: Exchanger,
    builder: Arc<dyn StepBuilder>,
    tracker: Arc<dyn InitializedTracker>,
    emitter: Emitter,

    healthy_monitoring_interval: Duration,
    unhealthy_monitoring_interval: Duration,

    /// guid → supervised step process. Insert on `run`, take on
    /// `stop`/`destroy`; never held across host RPCs or step code.
    processes: Mutex<HashMap<String, Supervised<StoreError>>>,
}

impl ContainerStore {
    pub fn new(
        config: &Config,
        host: Arc<dyn HostClient>,
        builder: Arc<dyn StepBuilder>,
        tracker: Arc<dyn InitializedTracker>,
        emitter: Emitter,
    ) -> Self {
        Self {
            exchanger: Exchanger::new(
                config.owner_name.clone(),
                config.max_cpu_shares,
                config.inode_limit,
            ),
            host,
            builder,
            tracker,
            emitter,
            healthy_monitoring_interval: config.healthy_monitoring_interval,
            unhealthy_monitoring_interval: config.unhealthy_monitoring_interval,
            processes: Mutex::new(HashMap::new()),
        }
    }

    pub async fn lookup(&self, guid: &str) -> Result<Container, StoreError> {
        let handle = self
            .host
            .lookup(guid)
            .await
            .map_err(|_| StoreError::NotFound)?;
        self.exchanger.from_host(handle.as_ref()).await
    }

    /// Containers owned by this node, optionally narrowed by tags.
    /// Containers with unreadable properties are skipped, not fatal.
    pub async fn list(&self, tags: &Tags) -> Result<Vec<Container>, StoreError> {
        let handles = self.host.list(self.exchanger.list_filter(tags)).await?;

        let mut containers = Vec::with_capacity(handles.len());
        for handle in handles {
            match self.exchanger.from_host(handle.as_ref()).await {
                Ok(container) => containers.push(container),
                Err(err) => {
                    tracing::warn!(guid = handle.guid(), error = %err, "skipping unreadable container");
                }
            }
        }
        Ok(containers)
    }

    /// Materializes the host container and registers it with the
    /// tracker. Requires `Initializing`; moves the record to `Created`.
    pub async fn create(&self, mut container: Container) -> Result<Container, StoreError> {
        tracing::debug!(guid = %container.guid, "creating container");
        if container.state != ContainerState::Initializing {
            return Err(StoreError::InvalidTransition);
        }
        container.state = ContainerState::Created;

        let container = self.exchanger.create(self.host.as_ref(), container).await?;
        self.tracker.initialize(container.clone()).await;

        tracing::info!(guid = %container.guid, "container created");
        Ok(container)
    }

    /// Builds the step tree and spawns the supervised step process.
    /// Returns immediately; all further transitions happen inside the
    /// task and surface through the event stream.
    pub async fn run(&self, container: Container) -> Result<(), StoreError> {
        tracing::debug!(guid = %container.guid, "running container");
        let handle = match self.host.lookup(&container.guid).await {
            Ok(handle) => handle,
            Err(HostError::NotFound) => return Err(StoreError::NotFound),
            Err(err) => return Err(err.into()),
        };

        let transitions = Transitions {
            container: Arc::clone(&handle),
            exchanger: self.exchanger.clone(),
            emitter: self.emitter.clone(),
        };

        if container.state != ContainerState::Created {
            tracing::debug!(
                guid = %container.guid,
                state = %container.state,
                "container not in created state; completing with failure"
            );
            let result = RunResult {
                failed: true,
                failure_reason: StoreError::InvalidTransition.to_string(),
            };
            if let Err(err) = transitions.to_complete(&result).await {
                tracing::error!(guid = %container.guid, error = %err, "failed transitioning to complete");
            }
            return Err(StoreError::InvalidTransition);
        }

        let mut sequence: Vec<StepRef> = Vec::new();
        if let Some(setup) = &container.setup {
            sequence.push(self.builder.step_for(
                setup,
                &handle,
                &container.log,
                &container.external_ip,
                &container.ports,
            ));
        }

        let mut parallel: Vec<StepRef> = vec![self.builder.step_for(
            &container.action,
            &handle,
            &container.log,
            &container.external_ip,
            &container.ports,
        )];

        let (ready_tx, ready_rx) = oneshot::channel();
        let monitor = match &container.monitor {
            Some(def) => {
                let probe = self.builder.step_for(
                    def,
                    &handle,
                    &container.log,
                    &container.external_ip,
                    &container.ports,
                );
                let monitor = Arc::new(MonitorStep::new(
                    probe,
                    ready_tx,
                    container.start_timeout,
                    self.healthy_monitoring_interval,
                    self.unhealthy_monitoring_interval,
                ));
                parallel.push(Arc::clone(&monitor) as StepRef);
                Some(monitor)
            }
            None => {
                // Unmonitored containers count as started right away.
                let _ = ready_tx.send(());
                None
            }
        };

        sequence.push(Arc::new(CodependentStep::new(parallel)));
        let tree: StepRef = Arc::new(SerialStep::new(sequence));

        let mut processes = self.processes.lock().await;
        if processes.contains_key(&container.guid) {
            return Err(StoreError::InvalidTransition);
        }
        let guid = container.guid.clone();
        let process = supervised::spawn(move |token, ready| {
            step_process(guid, tree, monitor, ready_rx, transitions, token, ready)
        });
        processes.insert(container.guid.clone(), process);
        let step_processes = processes.len();
        drop(processes);

        tracing::debug!(guid = %container.guid, step_processes, "stored step process");
        Ok(())
    }

    /// Cancels the container's step process and blocks until it exits.
    pub async fn stop(&self, guid: &str) -> Result<(), StoreError> {
        tracing::debug!(guid, "stopping container");
        let Some(process) = self.take_process(guid).await else {
            return Err(StoreError::NotFound);
        };
        process.cancel();
        process.wait().await?;
        tracing::info!(guid, "container stopped");
        Ok(())
    }

    /// Cancels the step process without waiting, destroys the host
    /// container, and drops the tracker entry. The tracker is updated
    /// only when host destruction succeeded.
    pub async fn destroy(&self, guid: &str) -> Result<(), StoreError> {
        tracing::debug!(guid, "destroying container");
        if let Some(process) = self.take_process(guid).await {
            process.cancel();
        }

        if let Err(err) = self.host.destroy(guid).await {
            tracing::error!(guid, error = %err, "failed to destroy host container");
            return Err(err.into());
        }
        self.tracker.deinitialize(guid).await;

        tracing::info!(guid, "container destroyed");
        Ok(())
    }

    /// Streams a file out of the container.
    pub async fn get_files(&self, guid: &str, source_path: &str) -> Result<ByteStream, StoreError> {
        let handle = self
            .host
            .lookup(guid)
            .await
            .map_err(|_| StoreError::NotFound)?;
        Ok(handle.stream_out(source_path).await?)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        Ok(self.host.ping().await?)
    }

    /// Long-lived task converging the tracker with host reality every
    /// `interval`. List errors are logged and retried next tick; exits
    /// cleanly on cancel.
    pub fn spawn_reconciler(self: &Arc<Self>, interval: Duration) -> Supervised<StoreError> {
        let store = Arc::clone(self);
        supervised::spawn(move |token, ready| async move {
            ready.notify();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                match store.list(&Tags::new()).await {
                    Ok(containers) => store.tracker.sync_initialized(containers).await,
                    Err(err) => {
                        tracing::error!(error = %err, "failed to list containers during reconcile");
                    }
                }
            }
            Ok(())
        })
    }

    /// Cancels every outstanding step process and waits for each.
    pub async fn shutdown(&self) {
        let processes: Vec<(String, Supervised<StoreError>)> = {
            let mut map = self.processes.lock().await;
            map.drain().collect()
        };
        for (_, process) in &processes {
            process.cancel();
        }
        for (guid, process) in processes {
            if let Err(err) = process.wait().await {
                tracing::error!(guid = %guid, error = %err, "step process exited with error");
            }
        }
    }

    async fn take_process(&self, guid: &str) -> Option<Supervised<StoreError>> {
        self.processes.lock().await.remove(guid)
    }
}

/// The narrow capability the step process needs to drive transitions:
/// host property writes plus event emission, not the whole store.
struct Transitions {
    container: Arc<dyn HostContainer>,
    exchanger: Exchanger,
    emitter: Emitter,
}

impl Transitions {
    async fn to_running(&self) -> Result<(), StoreError> {
        self.container
            .set_property(STATE_PROPERTY, ContainerState::Running.as_str())
            .await?;
        let container = self.exchanger.from_host(self.container.as_ref()).await?;
        self.emitter.emit(Event::ContainerRunning(container));
        Ok(())
    }

    async fn to_complete(&self, result: &RunResult) -> Result<(), StoreError> {
        let encoded = serde_json::to_string(result)?;
        self.container
            .set_property(RESULT_PROPERTY, &encoded)
            .await?;
        self.container
            .set_property(STATE_PROPERTY, ContainerState::Completed.as_str())
            .await?;
        let container = self.exchanger.from_host(self.container.as_ref()).await?;
        self.emitter.emit(Event::ContainerComplete(container));
        Ok(())
    }
}

/// The supervised per-container task. Multiplexes the cancel signal, the
/// readiness edge, and step-tree completion, and owns the terminal
/// transition.
async fn step_process(
    guid: String,
    tree: StepRef,
    monitor: Option<Arc<MonitorStep>>,
    mut ready_rx: oneshot::Receiver<()>,
    transitions: Transitions,
    token: CancellationToken,
    ready: ReadySignal,
) -> Result<(), StoreError> {
    tracing::debug!(guid = %guid, "step process started");
    ready.notify();

    let runner = ActionRunner::new(Arc::clone(&tree));
    let (complete_tx, mut complete_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let _ = runner.perform(complete_tx).await;
    });

    let mut result = RunResult::default();
    let mut signaled = false;
    let mut readiness_pending = true;

    let outcome = loop {
        tokio::select! {
            _ = token.cancelled(), if !signaled => {
                signaled = true;
                tracing::debug!(guid = %guid, "signaled");
                if let Some(monitor) = &monitor {
                    monitor.cancel();
                }
                tree.cancel();
            }
            readiness = &mut ready_rx, if readiness_pending => {
                readiness_pending = false;
                if readiness.is_err() {
                    // The monitor went away without declaring readiness;
                    // the completion branch carries its error.
                    continue;
                }
                tracing::debug!(guid = %guid, "transitioning to running");
                if let Err(err) = transitions.to_running().await {
                    tracing::error!(guid = %guid, error = %err, "failed transitioning to running");
                    result.failed = true;
                    result.failure_reason = err.to_string();
                    // The workload can no longer be reported as running;
                    // shut the tree down and consume its completion.
                    if let Some(monitor) = &monitor {
                        monitor.cancel();
                    }
                    tree.cancel();
                }
            }
            completed = complete_rx.recv() => {
                break completed;
            }
        }
    };

    match outcome.unwrap_or_else(|| Err(StepError::failed("step outcome channel closed"))) {
        Ok(()) => tracing::debug!(guid = %guid, "step finished normally"),
        Err(err) => {
            tracing::debug!(guid = %guid, error = %err, "step finished with error");
            // The first recorded failure wins.
            if !result.failed {
                result.failed = true;
                result.failure_reason = err.to_string();
            }
        }
    }

    if let Err(err) = transitions.to_complete(&result).await {
        tracing::error!(guid = %guid, error = %err, "failed transitioning to complete");
    }
    tracing::debug!(guid = %guid, "step process finished");
    Ok(())
}
