use anyhow::{Context, Result};
use std::io::BufRead;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use skyrelay::StateVectorsRequest;
use skyrelay::map_view::{
    MapEvent, MapSink, MapView, PickedFeature, RenderSet, RotationConvention, SnapshotRenderer,
};
use skyrelay::sse_client::subscribe;

/// Logs each redraw and optionally prints it as a GeoJSON line on stdout
struct LoggingSink {
    geojson: bool,
    draws: u64,
}

impl MapSink for LoggingSink {
    fn draw(&mut self, render_set: &RenderSet) {
        self.draws += 1;

        let selected = render_set.selected_feature();
        info!(
            features = render_set.len(),
            selected = ?selected.and_then(|f| f.icao24()),
            "Map redrawn"
        );
        if let Some(feature) = selected {
            info!(
                "Selected {} at ({:.4}, {:.4}) rotation {:?}",
                feature.icao24().unwrap_or_default(),
                feature.latitude(),
                feature.longitude(),
                feature.rotation()
            );
        }

        if self.geojson {
            match render_set.to_json() {
                Ok(json) => println!("{}", json),
                Err(e) => error!("Failed to serialize render set: {}", e),
            }
        }
    }
}

/// Read non-empty stdin lines on a plain thread.
///
/// The thread is never joined, so a read still blocked on stdin does not keep
/// the process alive once the watch ends.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    return;
                }
            };

            let id = line.trim();
            if id.is_empty() {
                continue;
            }
            if tx.blocking_send(id.to_string()).is_err() {
                return;
            }
        }
    });

    rx
}

/// Turn typed identifiers into pick events
async fn forward_picks(mut ids: mpsc::Receiver<String>, events: mpsc::Sender<MapEvent>) {
    while let Some(id) = ids.recv().await {
        let pick = MapEvent::Pick(vec![PickedFeature::with_icao24(&id)]);
        if events.send(pick).await.is_err() {
            return;
        }
    }
}

/// Subscribe to the relay and drive a map view until the stream ends or
/// `cancel` fires. Returns the subscription result whether or not `picks`
/// is still open.
async fn watch_relay<S: MapSink + 'static>(
    relay_url: &str,
    request: &StateVectorsRequest,
    renderer: SnapshotRenderer,
    sink: S,
    picks: mpsc::Receiver<String>,
    cancel: CancellationToken,
) -> Result<MapView<S>> {
    let (tx, rx) = mpsc::channel(64);

    let view_task = tokio::spawn(MapView::new(renderer, sink).run(rx));
    let picks_task = tokio::spawn(forward_picks(picks, tx.clone()));

    let http = reqwest::Client::builder()
        .user_agent(concat!("skyrelay/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;

    let result = subscribe(http, relay_url, request, tx, cancel).await;

    // Dropping the forwarder releases the last sender so the view can finish
    picks_task.abort();
    let view = view_task.await.context("Map view task failed")?;
    info!("Watch ended, selection {:?}", view.selection().selected());

    result.map(|()| view)
}

pub async fn handle_watch(
    relay_url: String,
    request: StateVectorsRequest,
    rotation: RotationConvention,
    geojson: bool,
) -> Result<()> {
    let cancel = CancellationToken::new();

    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping watch");
            ctrl_c_cancel.cancel();
        }
    });

    info!("Type an ICAO24 address and press enter to toggle its selection");

    let view = watch_relay(
        &relay_url,
        &request,
        SnapshotRenderer::new(rotation),
        LoggingSink { geojson, draws: 0 },
        spawn_stdin_reader(),
        cancel,
    )
    .await?;

    info!("Watched {} redraws", view.sink().draws);
    Ok(())
}
