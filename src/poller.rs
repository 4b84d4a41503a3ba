use anyhow::Result;
use async_trait::async_trait;
use futures_util::Stream;
use futures_util::stream;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::state_vectors::{StateVectorResponse, StateVectorsRequest};

/// Pull-based provider of live state vector snapshots
#[async_trait]
pub trait StateVectorSource: Send + Sync {
    async fn fetch_state_vectors(&self, request: &StateVectorsRequest)
    -> Result<StateVectorResponse>;

    /// Human-readable name of the upstream, used in logs and `/status`
    fn describe(&self) -> String;
}

struct PollState {
    source: Arc<dyn StateVectorSource>,
    request: StateVectorsRequest,
    interval: Duration,
    cancel: CancellationToken,
    first: bool,
}

/// Poll `source` every `interval`, yielding each successful snapshot.
///
/// The first fetch happens immediately. Failed fetches are logged and skipped,
/// and the next attempt still waits a full interval. The stream ends when
/// `cancel` fires or when it is dropped.
pub fn poll_state_vectors(
    source: Arc<dyn StateVectorSource>,
    request: StateVectorsRequest,
    interval: Duration,
    cancel: CancellationToken,
) -> impl Stream<Item = StateVectorResponse> + Send + 'static {
    let state = PollState {
        source,
        request,
        interval,
        cancel,
        first: true,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if !state.first {
                tokio::select! {
                    _ = state.cancel.cancelled() => {
                        debug!("State vector polling cancelled");
                        return None;
                    }
                    _ = tokio::time::sleep(state.interval) => {}
                }
            }
            state.first = false;

            let started = Instant::now();
            let result = tokio::select! {
                _ = state.cancel.cancelled() => {
                    debug!("State vector polling cancelled mid-request");
                    return None;
                }
                result = state.source.fetch_state_vectors(&state.request) => result,
            };
            metrics::histogram!("skyrelay.poll.duration_ms")
                .record(started.elapsed().as_millis() as f64);

            match result {
                Ok(response) => {
                    metrics::counter!("skyrelay.poll.success_total").increment(1);
                    return Some((response, state));
                }
                Err(e) => {
                    metrics::counter!("skyrelay.poll.errors_total").increment(1);
                    error!(
                        upstream = %state.source.describe(),
                        "Failed to fetch state vectors ({}): {:#}",
                        state.request,
                        e
                    );
                }
            }
        }
    })
}
