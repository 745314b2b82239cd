use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{EngineError, Locator, RetryPolicy};

/// Serde adapter storing a `Duration` as integer milliseconds.
pub mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Scripts used to detect an AJAX helper library and read its in-flight counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxProbe {
    /// Must evaluate to `true` when the library is loaded
    pub detect_script: String,
    /// Must evaluate to the number of active requests
    pub active_requests_script: String,
}

impl AjaxProbe {
    pub fn jquery() -> Self {
        Self {
            detect_script: "typeof jQuery != 'undefined'".to_string(),
            active_requests_script: "jQuery.active".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuiescenceConfig {
    #[serde(with = "duration_ms")]
    pub navigation_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub ajax_idle_timeout: Duration,
    #[serde(with = "duration_ms")]
    pub busy_indicator_timeout: Duration,
    pub busy_indicators: Vec<Locator>,
    pub ajax_probe: Option<AjaxProbe>,
    /// Consecutive idle polls required when network introspection is unavailable
    pub fallback_stable_polls: u32,
    /// Extra pause after timing-based settling
    #[serde(with = "duration_ms")]
    pub settle_delay: Duration,
}

impl Default for QuiescenceConfig {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(45),
            ajax_idle_timeout: Duration::from_secs(45),
            busy_indicator_timeout: Duration::from_secs(45),
            busy_indicators: vec![
                Locator::css(".AFBusyWait"),
                Locator::css(".fusionBusy"),
                Locator::css(".loading-mask"),
            ],
            ajax_probe: Some(AjaxProbe::jquery()),
            fallback_stable_polls: 5,
            settle_delay: Duration::from_millis(1000),
        }
    }
}

impl QuiescenceConfig {
    pub fn with_busy_indicators(mut self, locators: Vec<Locator>) -> Self {
        self.busy_indicators = locators;
        self
    }

    pub fn with_ajax_probe(mut self, probe: Option<AjaxProbe>) -> Self {
        self.ajax_probe = probe;
        self
    }

    pub fn with_stage_timeouts(mut self, ms: u64) -> Self {
        let timeout = Duration::from_millis(ms);
        self.navigation_timeout = timeout;
        self.ajax_idle_timeout = timeout;
        self.busy_indicator_timeout = timeout;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Regular expression a request URL must match to be tracked
    pub ajax_url_pattern: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ajax_url_pattern: ".*".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub quiescence: QuiescenceConfig,
    pub retry: RetryPolicy,
    pub network: NetworkConfig,
    #[serde(with = "duration_ms")]
    pub element_wait: Duration,
    #[serde(with = "duration_ms")]
    pub popup_wait: Duration,
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiescence: QuiescenceConfig::default(),
            retry: RetryPolicy::default(),
            network: NetworkConfig::default(),
            element_wait: Duration::from_secs(45),
            popup_wait: Duration::from_secs(30),
            poll_interval: Duration::from_millis(250),
        }
    }
}

impl EngineConfig {
    pub fn with_element_wait(mut self, ms: u64) -> Self {
        self.element_wait = Duration::from_millis(ms);
        self
    }

    pub fn with_popup_wait(mut self, ms: u64) -> Self {
        self.popup_wait = Duration::from_millis(ms);
        self
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval = Duration::from_millis(ms);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_quiescence(mut self, quiescence: QuiescenceConfig) -> Self {
        self.quiescence = quiescence;
        self
    }

    pub fn with_ajax_url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.network.ajax_url_pattern = pattern.into();
        self
    }

    pub fn fast() -> Self {
        Self {
            quiescence: QuiescenceConfig {
                settle_delay: Duration::from_millis(500),
                ..QuiescenceConfig::default()
            }
            .with_stage_timeouts(15_000),
            retry: RetryPolicy::default()
                .with_locate_timeout(Duration::from_secs(8))
                .with_backoff(crate::Backoff::Fixed {
                    delay: Duration::from_millis(500),
                }),
            network: NetworkConfig::default(),
            element_wait: Duration::from_secs(15),
            popup_wait: Duration::from_secs(15),
            poll_interval: Duration::from_millis(150),
        }
    }

    pub fn patient() -> Self {
        Self {
            quiescence: QuiescenceConfig {
                settle_delay: Duration::from_millis(2000),
                ..QuiescenceConfig::default()
            }
            .with_stage_timeouts(90_000),
            retry: RetryPolicy {
                max_attempts: 5,
                ..RetryPolicy::default()
            }
            .with_locate_timeout(Duration::from_secs(60)),
            network: NetworkConfig::default(),
            element_wait: Duration::from_secs(90),
            popup_wait: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
        }
    }

    /// Parses and validates a JSON document; absent fields take defaults.
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EngineError::InvalidConfig(format!("malformed engine config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.retry.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(EngineError::InvalidConfig(
                "poll_interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
