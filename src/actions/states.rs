use axum::{
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::StreamExt;
use std::convert::Infallible;
use tracing::{info, warn};

use super::json_error;
use crate::poller::poll_state_vectors;
use crate::state_vectors::StateVectorsRequest;
use crate::web::AppState;

/// Tracks one open event stream for the active-streams gauge
struct ActiveStream {
    request: String,
}

impl ActiveStream {
    fn open(request: &StateVectorsRequest) -> Self {
        metrics::gauge!("skyrelay.sse.active_streams").increment(1.0);
        info!("Opened state vector stream ({})", request);
        Self {
            request: request.to_string(),
        }
    }
}

impl Drop for ActiveStream {
    fn drop(&mut self) {
        metrics::gauge!("skyrelay.sse.active_streams").decrement(1.0);
        info!("Closed state vector stream ({})", self.request);
    }
}

/// Handler for GET /states/all
///
/// Streams one `data:` event per successful upstream poll until the client
/// disconnects or the server shuts down.
pub async fn stream_state_vectors(
    State(state): State<AppState>,
    query: Result<Query<StateVectorsRequest>, QueryRejection>,
) -> Response {
    let request = match query {
        Ok(Query(request)) => request,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, &rejection.body_text());
        }
    };

    if let Err(message) = request.validate() {
        return json_error(StatusCode::BAD_REQUEST, &message);
    }

    let active = ActiveStream::open(&request);
    let snapshots = poll_state_vectors(
        state.source.clone(),
        request,
        state.refresh_interval,
        state.shutdown.child_token(),
    );

    let events = snapshots.filter_map(move |snapshot| {
        let _active = &active;
        let event = match Event::default().json_data(&snapshot) {
            Ok(event) => Some(Ok::<_, Infallible>(event)),
            Err(e) => {
                warn!("Failed to serialize snapshot {}: {}", snapshot.time, e);
                None
            }
        };
        async move { event }
    });

    Sse::new(events)
        .keep_alive(KeepAlive::default())
        .into_response()
}
