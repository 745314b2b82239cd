#![allow(dead_code)]

//! In-memory page model implementing the driver capability traits.

use async_trait::async_trait;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::{Value, json};
use settle_engine::{
    AjaxProbe, Driver, DriverError, ElementHandle, EngineConfig, FailureKind, FrameContext,
    FrameHandle, InteractionEngine, Locator, NetworkActivityTracker, NetworkConfig, NetworkEvent,
    NetworkEventStream,
};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub type Formatter = fn(&str) -> String;
pub type ClickHook = Arc<dyn Fn(&FakeDriver) + Send + Sync>;

#[derive(Clone)]
pub struct NodeState {
    pub id: u64,
    pub displayed: bool,
    pub enabled: bool,
    pub value: String,
    pub formatter: Option<Formatter>,
}

pub struct PageState {
    pub ready_state: String,
    pub jquery_active: Option<i64>,
    pub frames: usize,
    pub current: FrameContext,
    pub nodes: HashMap<(FrameContext, Locator), NodeState>,
    pub click_failures: HashMap<Locator, VecDeque<FailureKind>>,
    pub scroll_failures: HashMap<Locator, VecDeque<FailureKind>>,
    pub hooks: HashMap<Locator, ClickHook>,
    pub log: Vec<String>,
    pub set_value_calls: usize,
    pub network: Option<mpsc::UnboundedSender<NetworkEvent>>,
    next_id: u64,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            ready_state: "complete".to_string(),
            jquery_active: None,
            frames: 0,
            current: FrameContext::Root,
            nodes: HashMap::new(),
            click_failures: HashMap::new(),
            scroll_failures: HashMap::new(),
            hooks: HashMap::new(),
            log: Vec::new(),
            set_value_calls: 0,
            network: None,
            next_id: 0,
        }
    }
}

#[derive(Clone, Default)]
pub struct FakeDriver {
    state: Arc<Mutex<PageState>>,
    streams_network: bool,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver that hands out a network event stream fed by [`emit`](Self::emit).
    pub fn with_network() -> Self {
        Self {
            streams_network: true,
            ..Self::default()
        }
    }

    pub fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    pub fn with_frames(self, frames: usize) -> Self {
        self.state().frames = frames;
        self
    }

    pub fn add(&self, locator: &Locator) {
        self.add_in(FrameContext::Root, locator);
    }

    pub fn add_in(&self, frame: FrameContext, locator: &Locator) {
        let mut state = self.state();
        state.next_id += 1;
        let node = NodeState {
            id: state.next_id,
            displayed: true,
            enabled: true,
            value: String::new(),
            formatter: None,
        };
        state.nodes.insert((frame, locator.clone()), node);
    }

    /// Replaces the node behind `locator` with a new one; old handles go stale.
    pub fn replace(&self, locator: &Locator) {
        self.add(locator);
    }

    pub fn remove(&self, locator: &Locator) {
        self.remove_in(FrameContext::Root, locator);
    }

    pub fn remove_in(&self, frame: FrameContext, locator: &Locator) {
        self.state().nodes.remove(&(frame, locator.clone()));
    }

    pub fn set_displayed(&self, locator: &Locator, displayed: bool) {
        self.set_displayed_in(FrameContext::Root, locator, displayed);
    }

    pub fn set_displayed_in(&self, frame: FrameContext, locator: &Locator, displayed: bool) {
        if let Some(node) = self.state().nodes.get_mut(&(frame, locator.clone())) {
            node.displayed = displayed;
        }
    }

    pub fn set_formatter(&self, locator: &Locator, formatter: Formatter) {
        if let Some(node) = self.state().nodes.get_mut(&(FrameContext::Root, locator.clone())) {
            node.formatter = Some(formatter);
        }
    }

    pub fn value(&self, locator: &Locator) -> Option<String> {
        self.state()
            .nodes
            .get(&(FrameContext::Root, locator.clone()))
            .map(|node| node.value.clone())
    }

    pub fn fail_clicks(&self, locator: &Locator, kinds: impl IntoIterator<Item = FailureKind>) {
        self.state()
            .click_failures
            .entry(locator.clone())
            .or_default()
            .extend(kinds);
    }

    pub fn fail_scrolls(&self, locator: &Locator, kinds: impl IntoIterator<Item = FailureKind>) {
        self.state()
            .scroll_failures
            .entry(locator.clone())
            .or_default()
            .extend(kinds);
    }

    pub fn on_click(&self, locator: &Locator, hook: impl Fn(&FakeDriver) + Send + Sync + 'static) {
        self.state().hooks.insert(locator.clone(), Arc::new(hook));
    }

    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    pub fn note(&self, entry: impl Into<String>) {
        self.state().log.push(entry.into());
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.state().log.iter().position(|e| e == entry)
    }

    pub fn count(&self, entry: &str) -> usize {
        self.state().log.iter().filter(|e| *e == entry).count()
    }

    pub fn set_value_calls(&self) -> usize {
        self.state().set_value_calls
    }

    pub fn current_frame(&self) -> FrameContext {
        self.state().current
    }

    pub fn emit(&self, event: NetworkEvent) {
        if let Some(sender) = &self.state().network {
            let _ = sender.unbounded_send(event);
        }
    }

    /// Runs `change` against this driver after `delay` of (virtual) time.
    pub fn after<F, Fut>(&self, delay: Duration, change: F)
    where
        F: FnOnce(FakeDriver) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let driver = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            change(driver).await;
        });
    }

    fn handle(&self, locator: &Locator) -> Result<FakeElement, DriverError> {
        let mut state = self.state();
        let key = (state.current, locator.clone());
        state.log.push(format!("locate {}", locator));
        match state.nodes.get(&key) {
            Some(node) => Ok(FakeElement {
                driver: self.clone(),
                key,
                id: node.id,
            }),
            None => Err(DriverError::not_found(format!("{} in {}", locator, key.0))),
        }
    }
}

pub struct FakeElement {
    driver: FakeDriver,
    key: (FrameContext, Locator),
    id: u64,
}

impl std::fmt::Debug for FakeElement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeElement")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

impl FakeElement {
    fn with_node<T>(&self, f: impl FnOnce(&mut NodeState) -> T) -> Result<T, DriverError> {
        let mut state = self.driver.state();
        match state.nodes.get_mut(&self.key) {
            Some(node) if node.id == self.id => Ok(f(node)),
            _ => Err(DriverError::stale(format!("{} detached", self.key.1))),
        }
    }
}

#[async_trait]
impl ElementHandle for FakeElement {
    async fn click(&self) -> Result<(), DriverError> {
        let locator = self.key.1.clone();
        let (displayed, enabled) = self.with_node(|node| (node.displayed, node.enabled))?;
        let hook = {
            let mut state = self.driver.state();
            if let Some(kind) = state.click_failures.get_mut(&locator).and_then(|q| q.pop_front()) {
                state.log.push(format!("click failed {} {:?}", locator, kind));
                return Err(DriverError::new(kind, format!("injected on {}", locator)));
            }
            if !displayed || !enabled {
                return Err(DriverError::not_interactable(locator.to_string()));
            }
            state.log.push(format!("click {}", locator));
            state.hooks.get(&locator).cloned()
        };
        if let Some(hook) = hook {
            hook(&self.driver);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), DriverError> {
        self.with_node(|node| node.value.clear())
    }

    async fn send_keys(&self, text: &str) -> Result<(), DriverError> {
        self.with_node(|node| {
            let typed = format!("{}{}", node.value, text);
            node.value = match node.formatter {
                Some(format) => format(&typed),
                None => typed,
            };
        })?;
        self.driver.note(format!("type {} {}", self.key.1, text));
        Ok(())
    }

    async fn is_displayed(&self) -> Result<bool, DriverError> {
        self.with_node(|node| node.displayed)
    }

    async fn is_enabled(&self) -> Result<bool, DriverError> {
        self.with_node(|node| node.enabled)
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError> {
        self.with_node(|node| (name == "value").then(|| node.value.clone()))
    }

    async fn scroll_into_view(&self) -> Result<(), DriverError> {
        self.with_node(|_| ())?;
        let locator = &self.key.1;
        let mut state = self.driver.state();
        if let Some(kind) = state.scroll_failures.get_mut(locator).and_then(|q| q.pop_front()) {
            state.log.push(format!("scroll failed {} {:?}", locator, kind));
            return Err(DriverError::new(kind, format!("injected on {}", locator)));
        }
        Ok(())
    }

    async fn set_value(&self, text: &str) -> Result<(), DriverError> {
        self.with_node(|node| node.value = text.to_string())?;
        let mut state = self.driver.state();
        state.set_value_calls += 1;
        state.log.push(format!("set_value {} {}", self.key.1, text));
        Ok(())
    }

    async fn is_stale(&self) -> Result<bool, DriverError> {
        Ok(self.with_node(|_| ()).is_err())
    }
}

#[async_trait]
impl Driver for FakeDriver {
    type Element = FakeElement;

    async fn locate(&self, locator: &Locator) -> Result<FakeElement, DriverError> {
        self.handle(locator)
    }

    async fn locate_all(&self, locator: &Locator) -> Result<Vec<FakeElement>, DriverError> {
        match self.handle(locator) {
            Ok(element) => Ok(vec![element]),
            Err(e) if e.kind == FailureKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    async fn frames(&self) -> Result<Vec<FrameHandle>, DriverError> {
        Ok((0..self.state().frames).map(FrameHandle).collect())
    }

    async fn switch_to_frame(&self, frame: FrameHandle) -> Result<(), DriverError> {
        let mut state = self.state();
        if frame.0 >= state.frames {
            return Err(DriverError::no_such_frame(format!("frame {}", frame.0)));
        }
        state.current = FrameContext::Frame(frame);
        state.log.push(format!("switch frame[{}]", frame.0));
        Ok(())
    }

    async fn switch_to_default_content(&self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.current = FrameContext::Root;
        state.log.push("switch root".to_string());
        Ok(())
    }

    fn frame_context(&self) -> FrameContext {
        self.state().current
    }

    async fn execute_script(&self, script: &str) -> Result<Value, DriverError> {
        let probe = AjaxProbe::jquery();
        let state = self.state();
        if script == "document.readyState" {
            Ok(json!(state.ready_state))
        } else if script == probe.detect_script {
            Ok(json!(state.jquery_active.is_some()))
        } else if script == probe.active_requests_script {
            match state.jquery_active {
                Some(active) => Ok(json!(active)),
                None => Err(DriverError::script("jQuery is not defined")),
            }
        } else {
            Err(DriverError::script(format!("unsupported script: {}", script)))
        }
    }

    async fn network_events(&self) -> Result<Option<NetworkEventStream>, DriverError> {
        if !self.streams_network {
            return Ok(None);
        }
        let (sender, receiver) = mpsc::unbounded();
        self.state().network = Some(sender);
        Ok(Some(receiver.boxed()))
    }
}

/// Inserts a thousands separator, like a numeric input mask.
pub fn group_thousands(raw: &str) -> String {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Engine over `driver` with a tracker that accepts every URL.
pub fn engine(driver: &FakeDriver, config: EngineConfig) -> InteractionEngine<FakeDriver> {
    let tracker = NetworkActivityTracker::from_config(&NetworkConfig::default()).unwrap();
    InteractionEngine::new(Arc::new(driver.clone()), Arc::new(tracker), config).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
