use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure classes reported by the driver capability layer.
///
/// Drivers classify their native errors into one of these once, at the
/// boundary; everything above consumes the kind as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Handle no longer corresponds to a node in the current document
    StaleReference,
    /// Another element would receive the click
    ClickIntercepted,
    /// Element exists but is hidden or disabled
    NotInteractable,
    /// A short-lived locate or operate wait expired
    Timeout,
    /// No element matches the locator
    NotFound,
    /// Frame handle is gone or not accessible
    NoSuchFrame,
    /// Script evaluation failed
    Script,
    /// Page navigation failed or is in progress
    Navigation,
    /// Capability is not offered by this driver
    Unsupported,
    /// Browser or transport error
    Browser,
}

impl FailureKind {
    /// Identity-level UI races that usually clear up on a fresh attempt.
    pub const TRANSIENT: [FailureKind; 4] = [
        FailureKind::StaleReference,
        FailureKind::ClickIntercepted,
        FailureKind::NotInteractable,
        FailureKind::Timeout,
    ];

    pub fn is_transient(self) -> bool {
        Self::TRANSIENT.contains(&self)
    }
}

/// Error returned by every driver capability call.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("[{kind:?}] {message}")]
pub struct DriverError {
    pub kind: FailureKind,
    pub message: String,
}

impl DriverError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn stale(message: impl Into<String>) -> Self {
        Self::new(FailureKind::StaleReference, message)
    }

    pub fn intercepted(message: impl Into<String>) -> Self {
        Self::new(FailureKind::ClickIntercepted, message)
    }

    pub fn not_interactable(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotInteractable, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, message)
    }

    pub fn no_such_frame(message: impl Into<String>) -> Self {
        Self::new(FailureKind::NoSuchFrame, message)
    }

    pub fn script(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Script, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Unsupported, message)
    }

    pub fn browser(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Browser, message)
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}
