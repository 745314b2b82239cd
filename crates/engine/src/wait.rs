//! Named wait strategies evaluated by a single bounded poll loop.

use settle_core::{
    AjaxProbe, Driver, DriverError, ElementHandle, EngineError, FailureKind, Locator,
};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, trace};

use crate::tracker::NetworkActivityTracker;

/// Condition polled by [`Waiter::until`].
pub enum WaitCondition<'a, E> {
    /// `document.readyState == "complete"`
    NavigationReady,
    /// Tracker idle and, when a probe is given, the library counter at zero
    AjaxIdle { probe: Option<&'a AjaxProbe> },
    /// None of the locators matches a displayed element
    BusyInvisible(&'a [Locator]),
    ElementPresent(&'a Locator),
    ElementVisible(&'a Locator),
    /// Absent, detached or not displayed
    ElementInvisible(&'a Locator),
    /// Displayed and enabled
    ElementClickable(&'a Locator),
    /// The captured handle has been detached from its document
    ElementStale(&'a E),
    All(Vec<WaitCondition<'a, E>>),
}

impl<E> fmt::Display for WaitCondition<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NavigationReady => f.write_str("navigation ready"),
            Self::AjaxIdle { .. } => f.write_str("ajax idle"),
            Self::BusyInvisible(locators) => {
                let names = locators.iter().map(|l| l.to_string()).collect::<Vec<_>>();
                write!(f, "busy indicators hidden [{}]", names.join(", "))
            }
            Self::ElementPresent(l) => write!(f, "{} present", l),
            Self::ElementVisible(l) => write!(f, "{} visible", l),
            Self::ElementInvisible(l) => write!(f, "{} invisible", l),
            Self::ElementClickable(l) => write!(f, "{} clickable", l),
            Self::ElementStale(_) => f.write_str("element stale"),
            Self::All(conditions) => {
                let names = conditions.iter().map(|c| c.to_string()).collect::<Vec<_>>();
                write!(f, "all of ({})", names.join(" and "))
            }
        }
    }
}

/// Returned when a condition did not hold within its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut {
    pub waited: Duration,
}

/// Poll loop shared by every wait in the engine.
pub struct Waiter<D: Driver> {
    driver: Arc<D>,
    tracker: Arc<NetworkActivityTracker>,
    poll_interval: Duration,
}

impl<D: Driver> Clone for Waiter<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            tracker: Arc::clone(&self.tracker),
            poll_interval: self.poll_interval,
        }
    }
}

impl<D: Driver> Waiter<D> {
    pub fn new(driver: Arc<D>, tracker: Arc<NetworkActivityTracker>, poll_interval: Duration) -> Self {
        Self {
            driver,
            tracker,
            poll_interval,
        }
    }

    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    pub fn tracker(&self) -> &Arc<NetworkActivityTracker> {
        &self.tracker
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Polls `condition` until it holds or `timeout` elapses. The condition is
    /// checked once before any sleep, so an already-satisfied wait is free.
    pub async fn until(
        &self,
        condition: &WaitCondition<'_, D::Element>,
        timeout: Duration,
    ) -> Result<Duration, TimedOut> {
        let started = Instant::now();
        loop {
            match self.check(condition).await {
                Ok(true) => return Ok(started.elapsed()),
                Ok(false) => trace!(%condition, "not yet"),
                Err(e) => debug!(%condition, error = %e, "check failed, polling again"),
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(TimedOut { waited: elapsed });
            }
            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Like [`until`](Self::until) but a timeout is an [`EngineError::WaitTimeout`].
    pub async fn require(
        &self,
        condition: &WaitCondition<'_, D::Element>,
        timeout: Duration,
    ) -> Result<Duration, EngineError> {
        self.until(condition, timeout)
            .await
            .map_err(|t| EngineError::WaitTimeout {
                condition: condition.to_string(),
                waited: t.waited,
            })
    }

    /// Single evaluation of `condition`.
    pub async fn check(&self, condition: &WaitCondition<'_, D::Element>) -> Result<bool, DriverError> {
        let mut pending = vec![condition];
        while let Some(next) = pending.pop() {
            match next {
                WaitCondition::All(conditions) => pending.extend(conditions.iter().rev()),
                leaf => {
                    if !self.check_leaf(leaf).await? {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    async fn check_leaf(&self, condition: &WaitCondition<'_, D::Element>) -> Result<bool, DriverError> {
        match condition {
            WaitCondition::NavigationReady => {
                let state = self.driver.execute_script("document.readyState").await?;
                Ok(state.as_str() == Some("complete"))
            }
            WaitCondition::AjaxIdle { probe } => {
                if !self.tracker.is_idle() {
                    return Ok(false);
                }
                match probe {
                    Some(probe) => {
                        let active = self.driver.execute_script(&probe.active_requests_script).await?;
                        Ok(counter_is_zero(&active))
                    }
                    None => Ok(true),
                }
            }
            WaitCondition::BusyInvisible(locators) => {
                for locator in locators.iter() {
                    if self.any_displayed(locator).await? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            WaitCondition::ElementPresent(locator) => {
                Ok(!self.driver.locate_all(locator).await?.is_empty())
            }
            WaitCondition::ElementVisible(locator) => {
                let element = self.driver.locate(locator).await?;
                element.is_displayed().await
            }
            WaitCondition::ElementInvisible(locator) => {
                let displayed = match self.driver.locate(locator).await {
                    Ok(element) => element.is_displayed().await,
                    Err(e) => Err(e),
                };
                match displayed {
                    Ok(displayed) => Ok(!displayed),
                    Err(e) if means_gone(&e) => Ok(true),
                    Err(e) => Err(e),
                }
            }
            WaitCondition::ElementClickable(locator) => {
                let element = self.driver.locate(locator).await?;
                Ok(element.is_displayed().await? && element.is_enabled().await?)
            }
            WaitCondition::ElementStale(element) => match element.is_stale().await {
                Ok(stale) => Ok(stale),
                Err(e) if e.kind == FailureKind::StaleReference => Ok(true),
                Err(e) => Err(e),
            },
            WaitCondition::All(_) => Ok(true),
        }
    }

    async fn any_displayed(&self, locator: &Locator) -> Result<bool, DriverError> {
        let elements = match self.driver.locate_all(locator).await {
            Ok(elements) => elements,
            Err(e) if means_gone(&e) => return Ok(false),
            Err(e) => return Err(e),
        };
        for element in elements {
            match element.is_displayed().await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) if means_gone(&e) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }
}

fn means_gone(e: &DriverError) -> bool {
    matches!(
        e.kind,
        FailureKind::NotFound | FailureKind::NoSuchFrame | FailureKind::StaleReference
    )
}

fn counter_is_zero(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(idle) => *idle,
        Value::String(s) => s.trim() == "0",
        _ => false,
    }
}
