use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, ResourceType,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use futures::stream::select_all;
use settle_core::{DriverError, NetworkEvent, NetworkEventStream, ResourceKind};
use tracing::debug;

use crate::shared::classify;

/// Enables the Network domain and merges request lifecycle events into one
/// stream.
pub async fn subscribe(page: &Page) -> Result<NetworkEventStream, DriverError> {
    page.execute(EnableParams::default()).await
        .map_err(|e| classify(e, "EnableNetwork"))?;

    let started = page.event_listener::<EventRequestWillBeSent>().await
        .map_err(|e| classify(e, "ListenRequestWillBeSent"))?
        .map(|ev| NetworkEvent::RequestStarted {
            request_id: ev.request_id.as_ref().to_string(),
            url: ev.request.url.clone(),
            resource: resource_kind(ev.r#type.as_ref()),
        });
    let finished = page.event_listener::<EventLoadingFinished>().await
        .map_err(|e| classify(e, "ListenLoadingFinished"))?
        .map(|ev| NetworkEvent::RequestFinished {
            request_id: ev.request_id.as_ref().to_string(),
        });
    let failed = page.event_listener::<EventLoadingFailed>().await
        .map_err(|e| classify(e, "ListenLoadingFailed"))?
        .map(|ev| NetworkEvent::RequestFailed {
            request_id: ev.request_id.as_ref().to_string(),
        });

    debug!("network event listeners attached");
    Ok(select_all([started.boxed(), finished.boxed(), failed.boxed()]).boxed())
}

fn resource_kind(kind: Option<&ResourceType>) -> ResourceKind {
    match kind {
        Some(ResourceType::Xhr) => ResourceKind::Xhr,
        Some(ResourceType::Fetch) => ResourceKind::Fetch,
        Some(ResourceType::Document) => ResourceKind::Document,
        _ => ResourceKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_xhr_and_fetch_are_ajax() {
        assert!(resource_kind(Some(&ResourceType::Xhr)).is_ajax());
        assert!(resource_kind(Some(&ResourceType::Fetch)).is_ajax());
        assert_eq!(resource_kind(Some(&ResourceType::Document)), ResourceKind::Document);
        assert_eq!(resource_kind(Some(&ResourceType::Image)), ResourceKind::Other);
        assert_eq!(resource_kind(None), ResourceKind::Other);
    }
}
