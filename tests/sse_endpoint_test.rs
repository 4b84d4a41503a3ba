mod common;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use common::{ScriptedSource, snapshot};
use skyrelay::{AppState, SseDecoder, SseEvent, StateVectorResponse, build_router};

fn router(source: Arc<ScriptedSource>, shutdown: CancellationToken) -> Router {
    let state = AppState {
        source,
        refresh_interval: Duration::from_millis(10),
        shutdown,
    };
    build_router(state, &["http://localhost:4200".to_string()]).unwrap()
}

/// Read body frames until at least one event has been dispatched
async fn next_events(body: &mut Body, decoder: &mut SseDecoder) -> Vec<SseEvent> {
    loop {
        let frame = body
            .frame()
            .await
            .expect("stream ended early")
            .expect("body error");
        if let Ok(data) = frame.into_data() {
            let events = decoder.feed(&data);
            if !events.is_empty() {
                return events;
            }
        }
    }
}

async fn json_body(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_streams_snapshots_after_failed_poll() {
    let source = ScriptedSource::new(vec![
        Err(anyhow::anyhow!("upstream unavailable")),
        Ok(snapshot(100, &[("abc", 7.6, 51.9)])),
        Ok(snapshot(110, &[("abc", 7.7, 51.9)])),
    ]);
    let app = router(source.clone(), CancellationToken::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/states/all?icao24=ABC&lamin=50&lomin=7&lamax=53&lomax=8")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");

    let mut body = response.into_body();
    let mut decoder = SseDecoder::new();
    let mut received: Vec<StateVectorResponse> = Vec::new();

    tokio::time::timeout(Duration::from_secs(5), async {
        while received.len() < 2 {
            for event in next_events(&mut body, &mut decoder).await {
                assert!(event.is_message());
                received.push(StateVectorResponse::from_json(&event.data).unwrap());
            }
        }
    })
    .await
    .expect("timed out waiting for events");

    assert_eq!(received[0].time, 100);
    assert_eq!(received[1].time, 110);
    assert_eq!(
        received[0].states.as_ref().unwrap()[0].icao24.as_deref(),
        Some("abc")
    );

    let requests = source.requests();
    assert!(requests.len() >= 3);
    assert_eq!(requests[0].icao24.as_deref(), Some("ABC"));
    assert!(requests[0].bounding_box().is_some());
}

#[tokio::test]
async fn test_shutdown_ends_open_streams() {
    let shutdown = CancellationToken::new();
    let source = ScriptedSource::new(vec![Ok(snapshot(1, &[("a", 1.0, 1.0)]))]);
    let app = router(source, shutdown.clone());

    let response = app
        .oneshot(Request::builder().uri("/states/all").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let mut body = response.into_body();
    let mut decoder = SseDecoder::new();

    let first = tokio::time::timeout(Duration::from_secs(5), next_events(&mut body, &mut decoder))
        .await
        .unwrap();
    assert_eq!(first.len(), 1);

    shutdown.cancel();

    let ended = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(frame) = body.frame().await {
            frame.unwrap();
        }
    })
    .await;
    assert!(ended.is_ok(), "stream should end after shutdown");
}

#[tokio::test]
async fn test_out_of_range_latitude_is_rejected() {
    let source = ScriptedSource::new(Vec::new());
    let app = router(source.clone(), CancellationToken::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/states/all?lamin=95&lomin=0&lamax=96&lomax=1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response.into_body()).await;
    assert!(json["errors"].as_str().unwrap().contains("lamin"));
    assert!(source.requests().is_empty());
}

#[tokio::test]
async fn test_unparseable_query_is_rejected() {
    let app = router(ScriptedSource::new(Vec::new()), CancellationToken::new());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/states/all?time=yesterday")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response.into_body()).await;
    assert!(json["errors"].is_string());
}

#[tokio::test]
async fn test_status_reports_relay_settings() {
    let app = router(ScriptedSource::new(Vec::new()), CancellationToken::new());

    let response = app
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response.into_body()).await;
    assert_eq!(json["data"]["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["data"]["upstream"], "scripted");
    assert_eq!(json["data"]["refreshIntervalSeconds"], 0);
    assert!(json["data"]["uptimeHuman"].is_string());
}

#[tokio::test]
async fn test_cors_allows_configured_origin_with_credentials() {
    let app = router(ScriptedSource::new(Vec::new()), CancellationToken::new());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/states/all")
                .header(header::ORIGIN, "http://localhost:4200")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:4200"
    );
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

#[tokio::test]
async fn test_cors_ignores_unknown_origin() {
    let app = router(ScriptedSource::new(Vec::new()), CancellationToken::new());

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/states/all")
                .header(header::ORIGIN, "http://evil.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}
