use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::{DriverError, Locator};

/// Phases of a list-of-values popup transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PopupPhase {
    Opening,
    Searching,
    AwaitingResults,
    Selecting,
    Confirming,
    Closing,
    Closed,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Retry budget exhausted on transient failures
    #[error("action on {locator} failed after {attempts} attempt(s): {last_cause}")]
    ActionFailure {
        locator: Locator,
        last_cause: DriverError,
        attempts: u32,
    },

    /// Non-retryable failure while acting on an element
    #[error("action on {locator} failed: {source}")]
    Interaction {
        locator: Locator,
        #[source]
        source: DriverError,
    },

    #[error("timed out after {waited:?} waiting for {condition}")]
    WaitTimeout { condition: String, waited: Duration },

    #[error("popup container {container} not found in root document or {frames_searched} frame(s)")]
    PopupNotFound {
        container: Locator,
        frames_searched: usize,
    },

    /// A popup phase ran past its wait budget. `cause` holds the action
    /// failure when the phase ran out of time inside an element action.
    #[error("popup timed out in phase {phase:?} while selecting '{search_text}'")]
    PopupTimeout {
        phase: PopupPhase,
        search_text: String,
        #[source]
        cause: Option<Box<EngineError>>,
    },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EngineError {
    /// Locator the failure originated from, when there is one.
    pub fn locator(&self) -> Option<&Locator> {
        match self {
            Self::ActionFailure { locator, .. }
            | Self::Interaction { locator, .. }
            | Self::PopupNotFound {
                container: locator, ..
            } => Some(locator),
            Self::PopupTimeout {
                cause: Some(cause), ..
            } => cause.locator(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_timeout_reports_locator_of_failed_action() {
        let search = Locator::id("lovSearchButton");
        let err = EngineError::PopupTimeout {
            phase: PopupPhase::Searching,
            search_text: "Acme Corp".to_string(),
            cause: Some(Box::new(EngineError::ActionFailure {
                locator: search.clone(),
                last_cause: DriverError::timeout("clickable not reached"),
                attempts: 2,
            })),
        };
        assert_eq!(err.locator(), Some(&search));
        assert!(std::error::Error::source(&err).is_some());

        let waited = EngineError::PopupTimeout {
            phase: PopupPhase::Closing,
            search_text: "Acme Corp".to_string(),
            cause: None,
        };
        assert_eq!(waited.locator(), None);
    }
}
