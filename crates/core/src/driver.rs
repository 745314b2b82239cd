use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::{DriverError, Locator};

/// Index of a frame (iframe/frame element) in the root document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameHandle(pub usize);

/// Browsing context the driver currently resolves locators in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FrameContext {
    #[default]
    Root,
    Frame(FrameHandle),
}

impl fmt::Display for FrameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => f.write_str("root"),
            Self::Frame(FrameHandle(index)) => write!(f, "frame[{}]", index),
        }
    }
}

/// Resource type reported with a request-started event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    Xhr,
    Fetch,
    Document,
    Other,
}

impl ResourceKind {
    pub fn is_ajax(self) -> bool {
        matches!(self, Self::Xhr | Self::Fetch)
    }
}

/// Network lifecycle event delivered by drivers that support introspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    RequestStarted {
        request_id: String,
        url: String,
        resource: ResourceKind,
    },
    RequestFinished {
        request_id: String,
    },
    RequestFailed {
        request_id: String,
    },
}

pub type NetworkEventStream = BoxStream<'static, NetworkEvent>;

/// Handle to a located element.
///
/// Handles are not guaranteed valid across a page mutation; every method may
/// fail with [`FailureKind::StaleReference`](crate::FailureKind::StaleReference).
#[async_trait]
pub trait ElementHandle: Send + Sync {
    async fn click(&self) -> Result<(), DriverError>;
    async fn clear(&self) -> Result<(), DriverError>;
    async fn send_keys(&self, text: &str) -> Result<(), DriverError>;
    async fn is_displayed(&self) -> Result<bool, DriverError>;
    async fn is_enabled(&self) -> Result<bool, DriverError>;
    /// Reads an attribute; `value` resolves to the live form value.
    async fn attribute(&self, name: &str) -> Result<Option<String>, DriverError>;
    async fn scroll_into_view(&self) -> Result<(), DriverError>;
    /// Writes the value straight into the DOM and fires `input`/`change`.
    async fn set_value(&self, text: &str) -> Result<(), DriverError>;
    /// True once the underlying node has been detached from its document.
    async fn is_stale(&self) -> Result<bool, DriverError>;
}

/// Capability interface of the underlying browser-automation driver.
#[async_trait]
pub trait Driver: Send + Sync {
    type Element: ElementHandle + 'static;

    /// Resolves the first match in the current frame context, failing with
    /// `NotFound` when nothing matches.
    async fn locate(&self, locator: &Locator) -> Result<Self::Element, DriverError>;

    /// Resolves every match in the current frame context; empty when absent.
    async fn locate_all(&self, locator: &Locator) -> Result<Vec<Self::Element>, DriverError>;

    /// Frames of the root document, in document order.
    async fn frames(&self) -> Result<Vec<FrameHandle>, DriverError>;

    async fn switch_to_frame(&self, frame: FrameHandle) -> Result<(), DriverError>;

    async fn switch_to_default_content(&self) -> Result<(), DriverError>;

    fn frame_context(&self) -> FrameContext;

    /// Evaluates an expression in the top-level document.
    async fn execute_script(&self, script: &str) -> Result<Value, DriverError>;

    /// Subscribes to request lifecycle events. `None` means the target does
    /// not support network introspection.
    async fn network_events(&self) -> Result<Option<NetworkEventStream>, DriverError> {
        Ok(None)
    }
}
