//! Single UI action with bounded retry over transient failure kinds.

use settle_core::{Driver, DriverError, ElementHandle, EngineError, Locator, RetryPolicy};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::wait::{WaitCondition, Waiter};

/// How a typed value is compared with what the field reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueCheck {
    #[default]
    Exact,
    /// Ignores whitespace and grouping separators added by input masks
    IgnoreFormatting,
}

impl ValueCheck {
    pub fn accepts(self, expected: &str, actual: &str) -> bool {
        match self {
            Self::Exact => expected == actual,
            Self::IgnoreFormatting => strip_formatting(expected) == strip_formatting(actual),
        }
    }
}

fn strip_formatting(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, ',' | '\'' | '_'))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation<'a> {
    Click,
    /// Focus, clear and type, then verify the resulting value
    TypeText { text: &'a str, check: ValueCheck },
}

impl Operation<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::TypeText { .. } => "type",
        }
    }
}

pub struct ActionRetrier<D: Driver> {
    waiter: Waiter<D>,
}

impl<D: Driver> ActionRetrier<D> {
    pub fn new(waiter: Waiter<D>) -> Self {
        Self { waiter }
    }

    /// Runs `operation` against a freshly located element, retrying failures
    /// whose kind `policy` names. Other failures propagate immediately.
    pub async fn perform(
        &self,
        locator: &Locator,
        operation: &Operation<'_>,
        policy: &RetryPolicy,
    ) -> Result<D::Element, EngineError> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let cause = match self.attempt(locator, operation, policy).await {
                Ok(element) => {
                    info!(%locator, action = operation.name(), attempt, "action succeeded");
                    return Ok(element);
                }
                Err(cause) => cause,
            };

            if !policy.retries(cause.kind) {
                warn!(%locator, action = operation.name(), error = %cause, "non-retryable failure");
                return Err(EngineError::Interaction {
                    locator: locator.clone(),
                    source: cause,
                });
            }
            if attempt >= max_attempts {
                warn!(%locator, action = operation.name(), attempt, error = %cause, "retries exhausted");
                return Err(EngineError::ActionFailure {
                    locator: locator.clone(),
                    last_cause: cause,
                    attempts: attempt,
                });
            }

            let delay = policy.backoff.delay(attempt);
            warn!(
                %locator,
                action = operation.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %cause,
                "transient failure, retrying"
            );
            sleep(delay).await;
        }
    }

    async fn attempt(
        &self,
        locator: &Locator,
        operation: &Operation<'_>,
        policy: &RetryPolicy,
    ) -> Result<D::Element, DriverError> {
        let ready = match operation {
            Operation::Click => WaitCondition::ElementClickable(locator),
            Operation::TypeText { .. } => WaitCondition::ElementVisible(locator),
        };
        if let Err(t) = self.waiter.until(&ready, policy.locate_timeout).await {
            return Err(DriverError::timeout(format!(
                "{} not reached after {}ms",
                ready,
                t.waited.as_millis()
            )));
        }

        let element = self.waiter.driver().locate(locator).await?;
        if let Err(e) = element.scroll_into_view().await {
            debug!(%locator, error = %e, "scroll into view failed, continuing");
        }

        match operation {
            Operation::Click => element.click().await?,
            Operation::TypeText { text, check } => {
                element.click().await?;
                element.clear().await?;
                element.send_keys(text).await?;

                let actual = element.attribute("value").await?.unwrap_or_default();
                if !check.accepts(text, &actual) {
                    debug!(%locator, expected = %text, %actual, "typed value rejected, writing value directly");
                    element.set_value(text).await?;
                }
            }
        }
        Ok(element)
    }
}
