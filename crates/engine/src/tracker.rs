//! Passive tracking of in-flight application AJAX requests.

use dashmap::DashMap;
use futures::StreamExt;
use regex::Regex;
use settle_core::{Driver, EngineError, NetworkConfig, NetworkEvent, NetworkEventStream, ResourceKind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub request_id: String,
    pub url: String,
    pub resource: ResourceKind,
}

/// Set of pending application requests, written by the listener task and read
/// by the quiescence detector.
///
/// When the target offers no network introspection the tracker is a stub that
/// always reports idle, and [`is_supported`](Self::is_supported) returns false.
#[derive(Debug)]
pub struct NetworkActivityTracker {
    pattern: Option<Regex>,
    pending: DashMap<String, PendingRequest>,
    supported: AtomicBool,
    generation: AtomicU64,
}

impl NetworkActivityTracker {
    pub fn new(pattern: Regex) -> Self {
        Self {
            pattern: Some(pattern),
            pending: DashMap::new(),
            supported: AtomicBool::new(true),
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &NetworkConfig) -> Result<Self, EngineError> {
        let pattern = Regex::new(&config.ajax_url_pattern).map_err(|e| {
            EngineError::InvalidConfig(format!(
                "ajax_url_pattern '{}' is not a valid regex: {}",
                config.ajax_url_pattern, e
            ))
        })?;
        Ok(Self::new(pattern))
    }

    /// Always-idle stub for targets without network events.
    pub fn unsupported() -> Self {
        Self {
            pattern: None,
            pending: DashMap::new(),
            supported: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    fn degrade(&self, reason: &str) {
        if self.supported.swap(false, Ordering::SeqCst) {
            warn!(reason, "network introspection unavailable, falling back to timing heuristics");
        }
        self.pending.clear();
    }

    /// Only the most recently started listener may degrade the tracker.
    fn stream_closed(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.degrade("network event stream closed");
        }
    }

    pub fn on_request_started(&self, request_id: &str, url: &str, resource: ResourceKind) {
        let matches = self.pattern.as_ref().is_some_and(|p| p.is_match(url));
        if !resource.is_ajax() || !matches {
            return;
        }
        debug!(request_id, url, "tracking request");
        self.pending.insert(
            request_id.to_string(),
            PendingRequest {
                request_id: request_id.to_string(),
                url: url.to_string(),
                resource,
            },
        );
    }

    pub fn on_request_finished(&self, request_id: &str) {
        if self.pending.remove(request_id).is_some() {
            debug!(request_id, remaining = self.pending.len(), "request finished");
        }
    }

    pub fn on_request_failed(&self, request_id: &str) {
        if self.pending.remove(request_id).is_some() {
            debug!(request_id, remaining = self.pending.len(), "request failed");
        }
    }

    pub fn record(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::RequestStarted {
                request_id,
                url,
                resource,
            } => self.on_request_started(&request_id, &url, resource),
            NetworkEvent::RequestFinished { request_id } => self.on_request_finished(&request_id),
            NetworkEvent::RequestFailed { request_id } => self.on_request_failed(&request_id),
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_supported() || self.pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> Vec<PendingRequest> {
        self.pending.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Subscribes to the driver's network events. Drivers without the
    /// capability leave the tracker in its always-idle degraded mode.
    pub async fn attach<D: Driver>(self: &Arc<Self>, driver: &D) -> Result<ListenerHandle, EngineError> {
        match driver.network_events().await? {
            Some(stream) => Ok(self.listen(stream)),
            None => {
                self.degrade("driver offers no network event stream");
                Ok(ListenerHandle::inert())
            }
        }
    }

    /// Spawns the listener task feeding `stream` into the pending set.
    ///
    /// A fresh stream restores the capability lost when an earlier stream
    /// closed; requests seen on the old stream are forgotten.
    pub fn listen(self: &Arc<Self>, mut stream: NetworkEventStream) -> ListenerHandle {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if self.pattern.is_some() {
            self.pending.clear();
            if !self.supported.swap(true, Ordering::SeqCst) {
                debug!(generation, "network introspection restored");
            }
        }
        let tracker = Arc::clone(self);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    event = stream.next() => match event {
                        Some(event) => tracker.record(event),
                        None => {
                            tracker.stream_closed(generation);
                            break;
                        }
                    },
                }
            }
        });
        ListenerHandle {
            cancel,
            task: Some(task),
        }
    }
}

/// Lifecycle handle for the listener task; dropping it stops the listener.
#[derive(Debug)]
pub struct ListenerHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    fn inert() -> Self {
        Self {
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    pub async fn shutdown(mut self) -> Result<(), tokio::task::JoinError> {
        self.cancel.cancel();
        match self.task.take() {
            Some(task) => match task.await {
                Ok(()) => Ok(()),
                Err(err) if err.is_cancelled() => Ok(()),
                Err(err) => Err(err),
            },
            None => Ok(()),
        }
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn tracker(pattern: &str) -> NetworkActivityTracker {
        NetworkActivityTracker::new(Regex::new(pattern).unwrap())
    }

    #[test]
    fn tracks_only_matching_ajax_requests() {
        let tracker = tracker("/fscmUI/");
        tracker.on_request_started("1", "https://erp.example.com/fscmUI/faces/Invoices", ResourceKind::Xhr);
        tracker.on_request_started("2", "https://erp.example.com/fscmUI/logo.png", ResourceKind::Other);
        tracker.on_request_started("3", "https://cdn.example.com/analytics", ResourceKind::Fetch);
        assert_eq!(tracker.pending_count(), 1);
        assert_eq!(tracker.pending()[0].request_id, "1");
        assert!(!tracker.is_idle());
    }

    #[test]
    fn terminal_events_are_idempotent() {
        let tracker = tracker(".*");
        tracker.on_request_started("7", "https://x/api", ResourceKind::Fetch);
        tracker.on_request_failed("7");
        tracker.on_request_finished("7");
        tracker.on_request_finished("never-seen");
        assert!(tracker.is_idle());
    }

    #[test]
    fn unsupported_stub_is_always_idle() {
        let tracker = NetworkActivityTracker::unsupported();
        tracker.on_request_started("1", "https://x/api", ResourceKind::Xhr);
        assert!(!tracker.is_supported());
        assert!(tracker.is_idle());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = NetworkActivityTracker::from_config(&NetworkConfig {
            ajax_url_pattern: "(".to_string(),
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn listener_drains_stream_then_degrades() {
        let tracker = Arc::new(tracker(".*"));
        let events = vec![
            NetworkEvent::RequestStarted {
                request_id: "a".into(),
                url: "https://x/api".into(),
                resource: ResourceKind::Xhr,
            },
            NetworkEvent::RequestFinished {
                request_id: "a".into(),
            },
        ];
        let handle = tracker.listen(stream::iter(events).boxed());
        while handle.is_listening() {
            tokio::task::yield_now().await;
        }
        assert!(tracker.is_idle());
        assert!(!tracker.is_supported());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn new_stream_restores_tracking_after_close() {
        let tracker = Arc::new(tracker(".*"));
        let closed = tracker.listen(stream::empty().boxed());
        while closed.is_listening() {
            tokio::task::yield_now().await;
        }
        assert!(!tracker.is_supported());

        let (sender, receiver) = futures::channel::mpsc::unbounded();
        let handle = tracker.listen(receiver.boxed());
        sender
            .unbounded_send(NetworkEvent::RequestStarted {
                request_id: "b".into(),
                url: "https://x/api".into(),
                resource: ResourceKind::Fetch,
            })
            .unwrap();
        while tracker.pending_count() == 0 {
            tokio::task::yield_now().await;
        }

        assert!(tracker.is_supported());
        assert!(!tracker.is_idle());
        closed.shutdown().await.unwrap();
        assert!(!tracker.is_idle());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn stale_listener_closing_does_not_degrade_newer_one() {
        let tracker = Arc::new(tracker(".*"));
        let (old_sender, old_receiver) = futures::channel::mpsc::unbounded::<NetworkEvent>();
        let old = tracker.listen(old_receiver.boxed());
        let (_sender, receiver) = futures::channel::mpsc::unbounded();
        let handle = tracker.listen(receiver.boxed());

        drop(old_sender);
        while old.is_listening() {
            tokio::task::yield_now().await;
        }
        assert!(tracker.is_supported());
        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn unsupported_stub_stays_degraded_when_listening() {
        let tracker = Arc::new(NetworkActivityTracker::unsupported());
        let handle = tracker.listen(stream::pending().boxed());
        assert!(!tracker.is_supported());
        handle.shutdown().await.unwrap();
    }
}
