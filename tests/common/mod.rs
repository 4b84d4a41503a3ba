//! Common test utilities for relay integration tests
//!
//! [`FakeUpstream`] serves a canned OpenSky `/states/all` response on a local
//! port and records every request it receives. [`ScriptedSource`] feeds the
//! relay router directly without any HTTP.
#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    routing::get,
};
use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

use skyrelay::{StateVector, StateVectorResponse, StateVectorSource, StateVectorsRequest};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
}

#[derive(Clone)]
struct FakeUpstreamState {
    status: StatusCode,
    body: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Local stand-in for the OpenSky REST API
pub struct FakeUpstream {
    pub base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

async fn fake_states(
    State(state): State<FakeUpstreamState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> (StatusCode, String) {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    state.requests.lock().unwrap().push(RecordedRequest {
        query,
        authorization,
    });

    (state.status, state.body.clone())
}

impl FakeUpstream {
    /// Serve `body` with `status` at `{base_url}/states/all`
    pub async fn start(status: StatusCode, body: impl Into<String>) -> Result<Self> {
        let requests = Arc::new(Mutex::new(Vec::new()));
        let state = FakeUpstreamState {
            status,
            body: body.into(),
            requests: requests.clone(),
        };

        let app = Router::new()
            .route("/api/states/all", get(fake_states))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            base_url: format!("http://{}/api", addr),
            requests,
            server,
        })
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// Two rows in the upstream positional format; the second has no position
pub const UPSTREAM_BODY: &str = r#"{
    "time": 1458564121,
    "states": [
        ["3c6444", "DLH9LF  ", "Germany", 1458564120, 1458564120, 6.1546, 50.1964,
         9639.3, false, 232.88, 98.26, 4.55, null, 9547.86, "1000", false, 0],
        ["4b1814", "SWR5KA  ", "Switzerland", null, 1458564121, null, null,
         null, true, 0.0, null, null, null, null, null, false, 0],
        ["short", "row"]
    ]
}"#;

/// Source returning scripted results in order, then empty snapshots
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<StateVectorResponse>>>,
    requests: Mutex<Vec<StateVectorsRequest>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<StateVectorResponse>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<StateVectorsRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StateVectorSource for ScriptedSource {
    async fn fetch_state_vectors(&self, request: &StateVectorsRequest) -> Result<StateVectorResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(snapshot(0, &[])))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// A snapshot of `(icao24, longitude, latitude)` records
pub fn snapshot(time: i64, aircraft: &[(&str, f64, f64)]) -> StateVectorResponse {
    StateVectorResponse {
        time,
        states: Some(
            aircraft
                .iter()
                .map(|(id, lon, lat)| StateVector {
                    icao24: Some(id.to_string()),
                    longitude: Some(*lon),
                    latitude: Some(*lat),
                    true_track: Some(90.0),
                    ..Default::default()
                })
                .collect(),
        ),
    }
}
