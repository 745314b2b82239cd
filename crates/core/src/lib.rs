//! Shared data model and driver capability interface for the settle engine.

pub mod config;
pub mod driver;
pub mod error;
pub mod failure;
pub mod locator;
pub mod policy;

pub use config::{AjaxProbe, EngineConfig, NetworkConfig, QuiescenceConfig};
pub use driver::{
    Driver, ElementHandle, FrameContext, FrameHandle, NetworkEvent, NetworkEventStream,
    ResourceKind,
};
pub use error::{EngineError, PopupPhase};
pub use failure::{DriverError, FailureKind};
pub use locator::{Locator, xpath_literal};
pub use policy::{Backoff, RetryPolicy};
