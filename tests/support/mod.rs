//! Shared fakes and helpers for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use stevedore::{
    ByteStream, Config, Container, ContainerStore, Emitter, Event, HealthCheckError,
    HealthChecker, HealthSink, HostClient, HostContainer, HostContainerInfo, HostCreateSpec,
    HostError, HostProcess, HostProcessSpec, LogDescriptor, PortMapping, Step, StepBuilder,
    StepDef, StepError, StepRef, Subscribe, Tracker,
};

// ---------------------------------------------------------------------------
// timing

/// Polls `cond` until it holds or a 5s deadline passes.
pub async fn wait_until<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------------------
// fake container host

pub struct FakeHostContainer {
    guid: String,
    pub properties: Mutex<HashMap<String, String>>,
    pub property_log: Mutex<Vec<(String, String)>>,
    /// key → number of upcoming `set_property` calls to fail.
    pub fail_next_set: Mutex<HashMap<String, u32>>,
    pub external_ip: String,
    pub ports: Vec<PortMapping>,
    pub file_content: Vec<u8>,
}

impl FakeHostContainer {
    pub fn new(guid: impl Into<String>, properties: HashMap<String, String>) -> Arc<Self> {
        Arc::new(Self {
            guid: guid.into(),
            properties: Mutex::new(properties),
            property_log: Mutex::new(Vec::new()),
            fail_next_set: Mutex::new(HashMap::new()),
            external_ip: "10.0.0.1".to_string(),
            ports: Vec::new(),
            file_content: Vec::new(),
        })
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.lock().unwrap().get(key).cloned()
    }

    pub fn fail_next_set_property(&self, key: &str, times: u32) {
        self.fail_next_set
            .lock()
            .unwrap()
            .insert(key.to_string(), times);
    }
}

#[async_trait]
impl HostContainer for FakeHostContainer {
    fn guid(&self) -> &str {
        &self.guid
    }

    async fn set_property(&self, key: &str, value: &str) -> Result<(), HostError> {
        {
            let mut failures = self.fail_next_set.lock().unwrap();
            if let Some(remaining) = failures.get_mut(key) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(HostError::Failed {
                        reason: format!("property store rejected {key}"),
                    });
                }
            }
        }
        self.properties
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.property_log
            .lock()
            .unwrap()
            .push((key.to_string(), value.to_string()));
        Ok(())
    }

    async fn get_property(&self, key: &str) -> Result<String, HostError> {
        self.property(key).ok_or(HostError::Failed {
            reason: format!("no such property {key}"),
        })
    }

    async fn info(&self) -> Result<HostContainerInfo, HostError> {
        Ok(HostContainerInfo {
            properties: self.properties.lock().unwrap().clone(),
            external_ip: self.external_ip.clone(),
            ports: self.ports.clone(),
        })
    }

    async fn stream_out(&self, _source_path: &str) -> Result<ByteStream, HostError> {
        Ok(Box::new(std::io::Cursor::new(self.file_content.clone())))
    }

    async fn run(&self, _spec: HostProcessSpec) -> Result<Box<dyn HostProcess>, HostError> {
        Err(HostError::Failed {
            reason: "fake host does not run processes".to_string(),
        })
    }
}

#[derive(Default)]
pub struct FakeHost {
    pub containers: Mutex<HashMap<String, Arc<FakeHostContainer>>>,
    pub fail_create: Mutex<Option<HostError>>,
    pub fail_destroy: Mutex<Option<HostError>>,
    pub fail_ping: Mutex<Option<HostError>>,
    pub fail_list: Mutex<Option<HostError>>,
    pub destroyed: Mutex<Vec<String>>,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, container: Arc<FakeHostContainer>) {
        self.containers
            .lock()
            .unwrap()
            .insert(container.guid().to_string(), container);
    }

    pub fn get(&self, guid: &str) -> Option<Arc<FakeHostContainer>> {
        self.containers.lock().unwrap().get(guid).cloned()
    }
}

#[async_trait]
impl HostClient for FakeHost {
    async fn create(&self, spec: HostCreateSpec) -> Result<Arc<dyn HostContainer>, HostError> {
        if let Some(err) = self.fail_create.lock().unwrap().clone() {
            return Err(err);
        }
        let container = FakeHostContainer::new(spec.handle.clone(), spec.properties);
        self.insert(Arc::clone(&container));
        Ok(container)
    }

    async fn lookup(&self, guid: &str) -> Result<Arc<dyn HostContainer>, HostError> {
        match self.get(guid) {
            Some(container) => Ok(container),
            None => Err(HostError::NotFound),
        }
    }

    async fn list(
        &self,
        filter: HashMap<String, String>,
    ) -> Result<Vec<Arc<dyn HostContainer>>, HostError> {
        if let Some(err) = self.fail_list.lock().unwrap().clone() {
            return Err(err);
        }
        let containers = self.containers.lock().unwrap();
        let mut matches: Vec<Arc<dyn HostContainer>> = Vec::new();
        for container in containers.values() {
            let properties = container.properties.lock().unwrap();
            if filter
                .iter()
                .all(|(k, v)| properties.get(k).is_some_and(|have| have == v))
            {
                matches.push(Arc::clone(container) as Arc<dyn HostContainer>);
            }
        }
        Ok(matches)
    }

    async fn destroy(&self, guid: &str) -> Result<(), HostError> {
        if let Some(err) = self.fail_destroy.lock().unwrap().clone() {
            return Err(err);
        }
        self.containers.lock().unwrap().remove(guid);
        self.destroyed.lock().unwrap().push(guid.to_string());
        Ok(())
    }

    async fn ping(&self) -> Result<(), HostError> {
        match self.fail_ping.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// scriptable steps

/// A step with a scriptable outcome: a queue of per-perform results, an
/// optional startup delay, or block-until-cancel behavior.
pub struct StubStep {
    outcomes: Mutex<VecDeque<Result<(), StepError>>>,
    default_outcome: Result<(), StepError>,
    delay: Option<Duration>,
    block: bool,
    canceled_outcome: Result<(), StepError>,
    token: CancellationToken,
    performs: AtomicUsize,
    cancels: AtomicUsize,
}

impl StubStep {
    fn base() -> Self {
        Self {
            outcomes: Mutex::new(VecDeque::new()),
            default_outcome: Ok(()),
            delay: None,
            block: false,
            canceled_outcome: Ok(()),
            token: CancellationToken::new(),
            performs: AtomicUsize::new(0),
            cancels: AtomicUsize::new(0),
        }
    }

    /// Succeeds immediately on every perform.
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::base())
    }

    /// Fails on every perform.
    pub fn failing(reason: &str) -> Arc<Self> {
        let mut step = Self::base();
        step.default_outcome = Err(StepError::failed(reason));
        Arc::new(step)
    }

    /// Returns the queued outcomes in order, then succeeds.
    pub fn sequence(outcomes: Vec<Result<(), StepError>>) -> Arc<Self> {
        let step = Self::base();
        *step.outcomes.lock().unwrap() = outcomes.into();
        Arc::new(step)
    }

    /// Sleeps before succeeding; a cancel during the sleep wins.
    pub fn slow(delay: Duration) -> Arc<Self> {
        let mut step = Self::base();
        step.delay = Some(delay);
        Arc::new(step)
    }

    /// Blocks until cancelled, then returns `Ok` (a clean cancel exit).
    pub fn blocking() -> Arc<Self> {
        let mut step = Self::base();
        step.block = true;
        Arc::new(step)
    }

    /// Blocks until cancelled, then returns the given outcome.
    pub fn blocking_with(outcome: Result<(), StepError>) -> Arc<Self> {
        let mut step = Self::base();
        step.block = true;
        step.canceled_outcome = outcome;
        Arc::new(step)
    }

    pub fn performs(&self) -> usize {
        self.performs.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Step for StubStep {
    async fn perform(&self) -> Result<(), StepError> {
        self.performs.fetch_add(1, Ordering::SeqCst);

        if self.block {
            self.token.cancelled().await;
            return self.canceled_outcome.clone();
        }
        if let Some(delay) = self.delay {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.token.cancelled() => return self.canceled_outcome.clone(),
            }
        }
        if self.token.is_cancelled() {
            return Err(StepError::Canceled);
        }
        let queued = self.outcomes.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.default_outcome.clone())
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
    }
}

/// Step builder resolving string definitions against registered steps.
/// Unknown definitions build a step that succeeds immediately.
#[derive(Default)]
pub struct MapBuilder {
    steps: Mutex<HashMap<String, StepRef>>,
}

impl MapBuilder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, name: &str, step: StepRef) {
        self.steps.lock().unwrap().insert(name.to_string(), step);
    }
}

impl StepBuilder for MapBuilder {
    fn step_for(
        &self,
        def: &StepDef,
        _container: &Arc<dyn HostContainer>,
        _log: &LogDescriptor,
        _external_ip: &str,
        _ports: &[PortMapping],
    ) -> StepRef {
        let name = def.as_str().unwrap_or_default();
        self.steps
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_else(|| StubStep::ok() as StepRef)
    }
}

// ---------------------------------------------------------------------------
// event subscribers

pub struct CollectingSubscriber {
    events: Mutex<Vec<Event>>,
}

impl CollectingSubscriber {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl Subscribe for CollectingSubscriber {
    async fn on_event(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

// ---------------------------------------------------------------------------
// health fakes

pub struct FakeChecker {
    outcomes: Mutex<VecDeque<Result<(), HealthCheckError>>>,
    block_when_empty: bool,
    calls: AtomicUsize,
}

impl FakeChecker {
    pub fn sequence(outcomes: Vec<Result<(), HealthCheckError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            block_when_empty: false,
            calls: AtomicUsize::new(0),
        })
    }

    /// Returns the queued outcomes, then blocks forever on each probe.
    pub fn sequence_then_hang(outcomes: Vec<Result<(), HealthCheckError>>) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            block_when_empty: true,
            calls: AtomicUsize::new(0),
        })
    }

    /// Never returns from any probe.
    pub fn hanging() -> Arc<Self> {
        Self::sequence_then_hang(Vec::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthChecker for FakeChecker {
    async fn healthcheck(&self) -> Result<(), HealthCheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let queued = self.outcomes.lock().unwrap().pop_front();
        match queued {
            Some(outcome) => outcome,
            None if self.block_when_empty => std::future::pending().await,
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<bool>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn log(&self) -> Vec<bool> {
        self.calls.lock().unwrap().clone()
    }
}

impl HealthSink for RecordingSink {
    fn set_healthy(&self, healthy: bool) {
        self.calls.lock().unwrap().push(healthy);
    }
}

// ---------------------------------------------------------------------------
// store fixture

pub struct StoreFixture {
    pub host: Arc<FakeHost>,
    pub builder: Arc<MapBuilder>,
    pub tracker: Arc<Tracker>,
    pub emitter: Emitter,
    pub collector: Arc<CollectingSubscriber>,
    pub store: Arc<ContainerStore>,
}

pub fn test_config() -> Config {
    Config {
        owner_name: "executor-test".to_string(),
        healthy_monitoring_interval: Duration::from_millis(30),
        unhealthy_monitoring_interval: Duration::from_millis(10),
        ..Config::default()
    }
}

pub fn store_fixture() -> StoreFixture {
    let host = FakeHost::new();
    let builder = MapBuilder::new();
    let tracker = Arc::new(Tracker::new());
    let collector = CollectingSubscriber::new();
    let emitter = Emitter::new(vec![Arc::clone(&collector) as Arc<dyn Subscribe>]);
    let store = Arc::new(ContainerStore::new(
        &test_config(),
        Arc::clone(&host) as Arc<dyn HostClient>,
        Arc::clone(&builder) as Arc<dyn StepBuilder>,
        Arc::clone(&tracker) as Arc<dyn stevedore::InitializedTracker>,
        emitter.clone(),
    ));
    StoreFixture {
        host,
        builder,
        tracker,
        emitter,
        collector,
        store,
    }
}

/// A record in `Initializing` whose action resolves through the fixture's
/// builder under the name `"action"`.
pub fn sample_container(guid: &str) -> Container {
    let mut container = Container::new(guid, serde_json::json!("action"));
    container.log = LogDescriptor {
        guid: guid.to_string(),
        source_name: "TEST".to_string(),
        index: Some(0),
    };
    container
}
