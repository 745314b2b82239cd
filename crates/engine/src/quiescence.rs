//! Composite "is the page settled?" detection.

use settle_core::{AjaxProbe, Driver, QuiescenceConfig};
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, warn};

use crate::wait::{WaitCondition, Waiter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    Settled(Duration),
    TimedOut(Duration),
    Skipped,
}

impl StageOutcome {
    pub fn is_settled(self) -> bool {
        !matches!(self, Self::TimedOut(_))
    }

    pub fn elapsed(self) -> Duration {
        match self {
            Self::Settled(d) | Self::TimedOut(d) => d,
            Self::Skipped => Duration::ZERO,
        }
    }
}

/// Per-stage result of one quiescence wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuiescenceReport {
    pub navigation: StageOutcome,
    pub ajax: StageOutcome,
    pub busy: StageOutcome,
    /// AJAX stage used timing heuristics because network events were unavailable
    pub degraded: bool,
}

impl QuiescenceReport {
    pub fn is_quiescent(&self) -> bool {
        self.navigation.is_settled() && self.ajax.is_settled() && self.busy.is_settled()
    }

    pub fn elapsed(&self) -> Duration {
        self.navigation.elapsed() + self.ajax.elapsed() + self.busy.elapsed()
    }
}

/// Blocks until navigation, AJAX activity and busy overlays have settled.
///
/// Best-effort: every stage is bounded and a timed-out stage is logged and
/// skipped over, never raised.
pub struct QuiescenceDetector<D: Driver> {
    waiter: Waiter<D>,
    config: QuiescenceConfig,
}

impl<D: Driver> QuiescenceDetector<D> {
    pub fn new(waiter: Waiter<D>, config: QuiescenceConfig) -> Self {
        if !waiter.tracker().is_supported() {
            warn!("network tracker unsupported, ajax stage will rely on timing heuristics");
        }
        Self { waiter, config }
    }

    pub fn config(&self) -> &QuiescenceConfig {
        &self.config
    }

    pub async fn settle(&self) -> QuiescenceReport {
        self.settle_with(&self.config).await
    }

    pub async fn settle_with(&self, config: &QuiescenceConfig) -> QuiescenceReport {
        let navigation = self
            .stage("navigation", &WaitCondition::NavigationReady, config.navigation_timeout)
            .await;

        let probe = self.detect_library(config).await;
        let degraded = !self.waiter.tracker().is_supported();
        let ajax = if degraded {
            self.settle_by_timing(probe, config).await
        } else {
            self.stage("ajax", &WaitCondition::AjaxIdle { probe }, config.ajax_idle_timeout)
                .await
        };

        let busy = if config.busy_indicators.is_empty() {
            StageOutcome::Skipped
        } else {
            self.stage(
                "busy",
                &WaitCondition::BusyInvisible(&config.busy_indicators),
                config.busy_indicator_timeout,
            )
            .await
        };

        let report = QuiescenceReport {
            navigation,
            ajax,
            busy,
            degraded,
        };
        debug!(?report, "quiescence wait finished");
        report
    }

    async fn stage(
        &self,
        name: &'static str,
        condition: &WaitCondition<'_, D::Element>,
        timeout: Duration,
    ) -> StageOutcome {
        match self.waiter.until(condition, timeout).await {
            Ok(elapsed) => StageOutcome::Settled(elapsed),
            Err(t) => {
                warn!(
                    stage = name,
                    waited_ms = t.waited.as_millis() as u64,
                    pending = self.waiter.tracker().pending_count(),
                    "quiescence stage timed out, continuing"
                );
                StageOutcome::TimedOut(t.waited)
            }
        }
    }

    async fn detect_library<'c>(&self, config: &'c QuiescenceConfig) -> Option<&'c AjaxProbe> {
        let probe = config.ajax_probe.as_ref()?;
        match self.waiter.driver().execute_script(&probe.detect_script).await {
            Ok(Value::Bool(true)) => Some(probe),
            Ok(_) => None,
            Err(e) => {
                debug!(error = %e, "ajax library probe failed, assuming absent");
                None
            }
        }
    }

    /// Requires several consecutive idle polls, then pauses for the settle delay.
    async fn settle_by_timing(
        &self,
        probe: Option<&AjaxProbe>,
        config: &QuiescenceConfig,
    ) -> StageOutcome {
        let condition = WaitCondition::AjaxIdle { probe };
        let required = config.fallback_stable_polls.max(1);
        let started = Instant::now();
        let mut stable = 0;

        loop {
            if self.waiter.check(&condition).await.unwrap_or(false) {
                stable += 1;
                if stable >= required {
                    sleep(config.settle_delay).await;
                    return StageOutcome::Settled(started.elapsed());
                }
            } else {
                if stable > 0 {
                    debug!(stable, "activity detected, resetting stable count");
                }
                stable = 0;
            }

            let elapsed = started.elapsed();
            if elapsed >= config.ajax_idle_timeout {
                warn!(
                    waited_ms = elapsed.as_millis() as u64,
                    "timing-based settle timed out, continuing"
                );
                return StageOutcome::TimedOut(elapsed);
            }
            sleep(self.waiter.poll_interval()).await;
        }
    }
}
