//! UI synchronisation and retry engine.
//!
//! [`InteractionEngine`] performs clicks and text entry through
//! [`ActionRetrier`], then blocks on [`QuiescenceDetector`] until navigation,
//! tracked AJAX requests and busy overlays have settled. [`PopupSelector`]
//! sequences engine calls into one list-of-values transaction.

pub mod interaction;
pub mod popup;
pub mod quiescence;
pub mod retrier;
pub mod tracker;
pub mod wait;

pub use interaction::{ActionOptions, InteractionEngine};
pub use popup::{
    CachedFrame, Discovery, FrameDiscovery, PopupLocators, PopupSelector, PopupSession,
    ProbeEachFrame,
};
pub use quiescence::{QuiescenceDetector, QuiescenceReport, StageOutcome};
pub use retrier::{ActionRetrier, Operation, ValueCheck};
pub use tracker::{ListenerHandle, NetworkActivityTracker, PendingRequest};
pub use wait::{TimedOut, WaitCondition, Waiter};

pub use settle_core::*;
