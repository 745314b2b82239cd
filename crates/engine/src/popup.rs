//! List-of-values popup transaction: open, search, pick a row, close.

use async_trait::async_trait;
use settle_core::{Driver, DriverError, EngineError, FailureKind, FrameContext, Locator, PopupPhase};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::interaction::InteractionEngine;
use crate::wait::{WaitCondition, Waiter};

/// Locators describing one popup widget.
///
/// `result_row` is a template: `{text}` is replaced with the search text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupLocators {
    pub trigger: Option<Locator>,
    pub container: Locator,
    pub search_field: Locator,
    pub search_button: Locator,
    pub results_busy: Vec<Locator>,
    pub result_row: Locator,
    pub confirm_button: Option<Locator>,
}

impl PopupLocators {
    pub fn new(container: Locator, search_field: Locator, search_button: Locator, result_row: Locator) -> Self {
        Self {
            trigger: None,
            container,
            search_field,
            search_button,
            results_busy: Vec::new(),
            result_row,
            confirm_button: None,
        }
    }

    pub fn with_trigger(mut self, trigger: Locator) -> Self {
        self.trigger = Some(trigger);
        self
    }

    pub fn with_results_busy(mut self, busy: Vec<Locator>) -> Self {
        self.results_busy = busy;
        self
    }

    pub fn with_confirm_button(mut self, confirm: Locator) -> Self {
        self.confirm_button = Some(confirm);
        self
    }
}

/// State of one `select_value` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopupSession {
    /// Context the container was found in
    pub frame: FrameContext,
    pub container: Locator,
    pub phase: PopupPhase,
}

impl PopupSession {
    fn new(container: &Locator) -> Self {
        Self {
            frame: FrameContext::Root,
            container: container.clone(),
            phase: PopupPhase::Opening,
        }
    }

    fn enter(&mut self, phase: PopupPhase) {
        debug!(from = ?self.phase, to = ?phase, frame = %self.frame, "popup phase");
        self.phase = phase;
    }
}

/// Outcome of one discovery round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discovery {
    /// The driver is left switched into this context
    Found(FrameContext),
    /// The driver is back at the root document
    Missing { frames_searched: usize },
}

/// Strategy for finding which browsing context hosts the popup container.
#[async_trait]
pub trait FrameDiscovery: Send + Sync {
    async fn discover<D: Driver>(&self, waiter: &Waiter<D>, container: &Locator) -> Result<Discovery, DriverError>;
}

/// Checks the root document, then switches into every frame in order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeEachFrame;

#[async_trait]
impl FrameDiscovery for ProbeEachFrame {
    async fn discover<D: Driver>(&self, waiter: &Waiter<D>, container: &Locator) -> Result<Discovery, DriverError> {
        let driver = waiter.driver();
        driver.switch_to_default_content().await?;
        if shown(waiter, container).await {
            return Ok(Discovery::Found(FrameContext::Root));
        }

        let frames = driver.frames().await?;
        for frame in &frames {
            if let Err(e) = driver.switch_to_frame(*frame).await {
                debug!(frame = frame.0, error = %e, "cannot enter frame, skipping");
                driver.switch_to_default_content().await?;
                continue;
            }
            if shown(waiter, container).await {
                return Ok(Discovery::Found(FrameContext::Frame(*frame)));
            }
            driver.switch_to_default_content().await?;
        }
        Ok(Discovery::Missing {
            frames_searched: frames.len(),
        })
    }
}

/// Tries the context of the last successful discovery first, then probes.
#[derive(Debug, Default)]
pub struct CachedFrame {
    last: Mutex<Option<FrameContext>>,
}

impl CachedFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<FrameContext> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remember(&self, context: Option<FrameContext>) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = context;
    }
}

#[async_trait]
impl FrameDiscovery for CachedFrame {
    async fn discover<D: Driver>(&self, waiter: &Waiter<D>, container: &Locator) -> Result<Discovery, DriverError> {
        if let Some(context) = self.last() {
            let driver = waiter.driver();
            let entered = match context {
                FrameContext::Root => driver.switch_to_default_content().await,
                FrameContext::Frame(frame) => driver.switch_to_frame(frame).await,
            };
            match entered {
                Ok(()) if shown(waiter, container).await => {
                    debug!(%context, "popup found in cached context");
                    return Ok(Discovery::Found(context));
                }
                Ok(()) => {}
                Err(e) => debug!(%context, error = %e, "cached context unavailable"),
            }
        }

        let discovery = ProbeEachFrame.discover(waiter, container).await?;
        match discovery {
            Discovery::Found(context) => self.remember(Some(context)),
            Discovery::Missing { .. } => self.remember(None),
        }
        Ok(discovery)
    }
}

async fn shown<D: Driver>(waiter: &Waiter<D>, locator: &Locator) -> bool {
    waiter
        .check(&WaitCondition::ElementVisible(locator))
        .await
        .unwrap_or(false)
}

/// Retry budget exhausted, or a non-retryable wait expiry.
fn out_of_time(e: &EngineError) -> bool {
    match e {
        EngineError::ActionFailure { .. } => true,
        EngineError::Interaction { source, .. } => source.kind == FailureKind::Timeout,
        _ => false,
    }
}

/// Drives one popup through every [`PopupPhase`] on top of an
/// [`InteractionEngine`].
///
/// The driver is switched back to the root document on every exit, including
/// failures.
pub struct PopupSelector<'e, D: Driver, S: FrameDiscovery = ProbeEachFrame> {
    engine: &'e InteractionEngine<D>,
    locators: PopupLocators,
    discovery: S,
}

impl<'e, D: Driver> PopupSelector<'e, D> {
    pub fn new(engine: &'e InteractionEngine<D>, locators: PopupLocators) -> Self {
        Self {
            engine,
            locators,
            discovery: ProbeEachFrame,
        }
    }
}

impl<'e, D: Driver, S: FrameDiscovery> PopupSelector<'e, D, S> {
    pub fn with_discovery<T: FrameDiscovery>(self, discovery: T) -> PopupSelector<'e, D, T> {
        PopupSelector {
            engine: self.engine,
            locators: self.locators,
            discovery,
        }
    }

    pub fn locators(&self) -> &PopupLocators {
        &self.locators
    }

    pub fn discovery(&self) -> &S {
        &self.discovery
    }

    /// Searches the popup for `text` and picks the matching row.
    ///
    /// Returns the closed session. Fails with `PopupNotFound` when no context
    /// shows the container within the popup wait, and `PopupTimeout` carrying
    /// the phase when any later phase runs out of time, including an element
    /// action whose retry budget is exhausted.
    pub async fn select_value(&self, text: &str) -> Result<PopupSession, EngineError> {
        let mut session = PopupSession::new(&self.locators.container);
        let outcome = self.run(&mut session, text).await;

        let restored = self.engine.driver().switch_to_default_content().await;
        match outcome {
            Ok(()) => {
                restored?;
                session.enter(PopupPhase::Closed);
                info!(search = text, frame = %session.frame, "popup value selected");
                Ok(session)
            }
            Err(e) => {
                if let Err(restore) = restored {
                    warn!(error = %restore, "could not restore root context after popup failure");
                }
                error!(phase = ?session.phase, search = text, locator = ?e.locator(), error = %e, "popup selection failed");
                Err(e)
            }
        }
    }

    async fn run(&self, session: &mut PopupSession, text: &str) -> Result<(), EngineError> {
        let engine = self.engine;
        let waiter = engine.waiter();
        let popup_wait = engine.config().popup_wait;
        let timeout = |phase: PopupPhase, cause: Option<EngineError>| EngineError::PopupTimeout {
            phase,
            search_text: text.to_string(),
            cause: cause.map(Box::new),
        };
        // element actions that run out of time surface as a timeout of the
        // phase they ran in
        let in_phase = |phase: PopupPhase, e: EngineError| if out_of_time(&e) { timeout(phase, Some(e)) } else { e };

        engine.driver().switch_to_default_content().await?;
        if let Some(trigger) = &self.locators.trigger {
            engine
                .click_and_settle(trigger)
                .await
                .map_err(|e| in_phase(PopupPhase::Opening, e))?;
        }
        session.frame = self.open(waiter, popup_wait).await?;

        session.enter(PopupPhase::Searching);
        engine
            .type_and_settle(&self.locators.search_field, text)
            .await
            .map_err(|e| in_phase(PopupPhase::Searching, e))?;
        engine
            .click_and_settle(&self.locators.search_button)
            .await
            .map_err(|e| in_phase(PopupPhase::Searching, e))?;

        session.enter(PopupPhase::AwaitingResults);
        let row = self.locators.result_row.fill(text);
        let results = WaitCondition::All(vec![
            WaitCondition::BusyInvisible(&self.locators.results_busy),
            WaitCondition::ElementClickable(&row),
        ]);
        waiter
            .until(&results, popup_wait)
            .await
            .map_err(|_| timeout(PopupPhase::AwaitingResults, None))?;

        session.enter(PopupPhase::Selecting);
        engine
            .click_and_settle(&row)
            .await
            .map_err(|e| in_phase(PopupPhase::Selecting, e))?;

        session.enter(PopupPhase::Confirming);
        let confirm = match &self.locators.confirm_button {
            Some(confirm) if shown(waiter, confirm).await => Some(confirm),
            _ => None,
        };
        match confirm {
            Some(confirm) => {
                engine
                    .click_and_settle(confirm)
                    .await
                    .map_err(|e| in_phase(PopupPhase::Confirming, e))?;
            }
            None => debug!("no confirm control shown, popup commits on row click"),
        }

        session.enter(PopupPhase::Closing);
        waiter
            .until(&WaitCondition::ElementInvisible(&session.container), popup_wait)
            .await
            .map_err(|_| timeout(PopupPhase::Closing, None))?;
        Ok(())
    }

    async fn open(&self, waiter: &Waiter<D>, popup_wait: Duration) -> Result<FrameContext, EngineError> {
        let container = &self.locators.container;
        let started = Instant::now();
        loop {
            match self.discovery.discover(waiter, container).await? {
                Discovery::Found(context) => {
                    debug!(%container, %context, "popup container found");
                    return Ok(context);
                }
                Discovery::Missing { frames_searched } => {
                    if started.elapsed() >= popup_wait {
                        return Err(EngineError::PopupNotFound {
                            container: container.clone(),
                            frames_searched,
                        });
                    }
                    debug!(%container, frames_searched, "popup container not shown yet");
                }
            }
            sleep(waiter.poll_interval()).await;
        }
    }
}
