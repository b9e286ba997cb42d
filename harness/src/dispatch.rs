use client::{ApiRequest, ApiSession, Exchange};
use futures::stream::{self, StreamExt};
use tracing::debug;

/// Sends `requests` with at most `max_in_flight` outstanding at once and
/// waits for all of them. Exchanges come back in request order.
pub async fn dispatch(session: &ApiSession, requests: Vec<ApiRequest>, max_in_flight: usize) -> Vec<Exchange> {
    let width = max_in_flight.max(1);
    debug!("Dispatching {} requests, {} in flight", requests.len(), width);

    stream::iter(requests)
        .map(|request| session.call(request))
        .buffered(width)
        .collect()
        .await
}
