use settle_core::{
    Driver, DriverError, EngineConfig, EngineError, FailureKind, Locator, QuiescenceConfig,
    RetryPolicy,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::quiescence::{QuiescenceDetector, QuiescenceReport};
use crate::retrier::{ActionRetrier, Operation, ValueCheck};
use crate::tracker::NetworkActivityTracker;
use crate::wait::{WaitCondition, Waiter};

/// Per-call overrides of the engine configuration.
#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    pub policy: Option<RetryPolicy>,
    pub value_check: ValueCheck,
    pub quiescence: Option<QuiescenceConfig>,
}

impl ActionOptions {
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    pub fn with_value_check(mut self, check: ValueCheck) -> Self {
        self.value_check = check;
        self
    }

    pub fn with_quiescence(mut self, quiescence: QuiescenceConfig) -> Self {
        self.quiescence = Some(quiescence);
        self
    }
}

/// Act-and-settle facade over one browser session.
///
/// Every action goes through [`ActionRetrier`] and then waits for quiescence
/// before returning, so the next caller step never overlaps the previous
/// step's network activity.
pub struct InteractionEngine<D: Driver> {
    waiter: Waiter<D>,
    retrier: ActionRetrier<D>,
    detector: QuiescenceDetector<D>,
    config: EngineConfig,
}

impl<D: Driver> InteractionEngine<D> {
    /// Fails with `InvalidConfig` when `config` does not validate.
    pub fn new(
        driver: Arc<D>,
        tracker: Arc<NetworkActivityTracker>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let waiter = Waiter::new(driver, tracker, config.poll_interval);
        Ok(Self {
            retrier: ActionRetrier::new(waiter.clone()),
            detector: QuiescenceDetector::new(waiter.clone(), config.quiescence.clone()),
            waiter,
            config,
        })
    }

    pub fn driver(&self) -> &Arc<D> {
        self.waiter.driver()
    }

    pub fn tracker(&self) -> &Arc<NetworkActivityTracker> {
        self.waiter.tracker()
    }

    pub fn waiter(&self) -> &Waiter<D> {
        &self.waiter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn settle(&self) -> QuiescenceReport {
        self.detector.settle().await
    }

    pub async fn click_and_settle(&self, locator: &Locator) -> Result<QuiescenceReport, EngineError> {
        self.click_and_settle_with(locator, &ActionOptions::default()).await
    }

    pub async fn click_and_settle_with(
        &self,
        locator: &Locator,
        options: &ActionOptions,
    ) -> Result<QuiescenceReport, EngineError> {
        self.act_and_settle(locator, &Operation::Click, options).await
    }

    pub async fn type_and_settle(&self, locator: &Locator, text: &str) -> Result<QuiescenceReport, EngineError> {
        self.type_and_settle_with(locator, text, &ActionOptions::default()).await
    }

    pub async fn type_and_settle_with(
        &self,
        locator: &Locator,
        text: &str,
        options: &ActionOptions,
    ) -> Result<QuiescenceReport, EngineError> {
        let operation = Operation::TypeText {
            text,
            check: options.value_check,
        };
        self.act_and_settle(locator, &operation, options).await
    }

    async fn act_and_settle(
        &self,
        locator: &Locator,
        operation: &Operation<'_>,
        options: &ActionOptions,
    ) -> Result<QuiescenceReport, EngineError> {
        let policy = options.policy.as_ref().unwrap_or(&self.config.retry);
        self.retrier.perform(locator, operation, policy).await?;

        let report = match &options.quiescence {
            Some(quiescence) => self.detector.settle_with(quiescence).await,
            None => self.detector.settle().await,
        };
        info!(
            %locator,
            quiescent = report.is_quiescent(),
            settle_ms = report.elapsed().as_millis() as u64,
            "settled after action"
        );
        Ok(report)
    }

    pub async fn wait_visible(&self, locator: &Locator) -> Result<(), EngineError> {
        self.waiter
            .require(&WaitCondition::ElementVisible(locator), self.config.element_wait)
            .await?;
        Ok(())
    }

    /// Returns immediately when nothing matches `locator`.
    pub async fn wait_invisible(&self, locator: &Locator) -> Result<(), EngineError> {
        self.waiter
            .require(&WaitCondition::ElementInvisible(locator), self.config.element_wait)
            .await?;
        Ok(())
    }

    pub async fn wait_present(&self, locator: &Locator) -> Result<(), EngineError> {
        self.waiter
            .require(&WaitCondition::ElementPresent(locator), self.config.element_wait)
            .await?;
        Ok(())
    }

    /// Waits for the element currently matching `locator` to detach, then for
    /// a replacement to appear. Used when a region reloads in place.
    pub async fn wait_stale_then_present(&self, locator: &Locator) -> Result<(), EngineError> {
        match self.waiter.driver().locate(locator).await {
            Ok(current) => {
                self.waiter
                    .require(&WaitCondition::ElementStale(&current), self.config.element_wait)
                    .await?;
                debug!(%locator, "previous element detached");
            }
            Err(DriverError {
                kind: FailureKind::NotFound | FailureKind::StaleReference,
                ..
            }) => debug!(%locator, "no element to outlive, waiting for presence"),
            Err(e) => return Err(e.into()),
        }
        self.wait_present(locator).await
    }
}
