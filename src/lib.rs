//! skyrelay - live OpenSky aircraft positions relayed as server-sent events
//!
//! The relay polls the OpenSky Network REST API and pushes every snapshot to
//! subscribed browsers over `text/event-stream`. The [`map_view`] module holds
//! the consumer side: rendering snapshots into map features while keeping the
//! user's selected aircraft highlighted across updates.

pub mod actions;
pub mod config;
pub mod log_format;
pub mod map_view;
pub mod metrics;
pub mod opensky_client;
pub mod poller;
pub mod sse_client;
pub mod state_vectors;
pub mod telemetry;
pub mod web;

pub use config::{AppConfig, Credentials};
pub use opensky_client::OpenSkyClient;
pub use poller::{StateVectorSource, poll_state_vectors};
pub use sse_client::{RelaySubscriber, SseDecoder, SseEvent};
pub use state_vectors::{PositionSource, StateVector, StateVectorResponse, StateVectorsRequest};
pub use web::{AppState, build_router, start_web_server};
