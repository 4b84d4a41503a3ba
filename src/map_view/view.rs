use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::render::{RenderSet, SnapshotRenderer};
use super::selection::{PickedFeature, SelectionController, SelectionState};
use crate::state_vectors::StateVectorResponse;

/// Receives every full redraw of the map
pub trait MapSink: Send {
    fn draw(&mut self, render_set: &RenderSet);
}

/// Notifications delivered to a [`MapView`], processed strictly in order
#[derive(Debug, Clone)]
pub enum MapEvent {
    /// A decoded stream payload; `None` when the payload was unusable
    Snapshot(Option<StateVectorResponse>),
    /// Features hit by a user pick, in hit order
    Pick(Vec<PickedFeature>),
    /// The snapshot subscription failed and will deliver nothing further
    StreamError(String),
}

/// Owns the last snapshot, the selection and the last render set.
///
/// Every snapshot with states and every selection change produces exactly one
/// redraw. Empty notifications (null snapshots, stream errors, picks with no
/// hits) leave the drawn state untouched.
pub struct MapView<S: MapSink> {
    renderer: SnapshotRenderer,
    sink: S,
    selection: SelectionState,
    last_snapshot: Option<StateVectorResponse>,
    render_set: Option<RenderSet>,
    stream_failed: bool,
}

impl<S: MapSink> MapView<S> {
    pub fn new(renderer: SnapshotRenderer, sink: S) -> Self {
        Self {
            renderer,
            sink,
            selection: SelectionState::none(),
            last_snapshot: None,
            render_set: None,
            stream_failed: false,
        }
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn last_snapshot(&self) -> Option<&StateVectorResponse> {
        self.last_snapshot.as_ref()
    }

    pub fn render_set(&self) -> Option<&RenderSet> {
        self.render_set.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn stream_failed(&self) -> bool {
        self.stream_failed
    }

    pub fn handle(&mut self, event: MapEvent) {
        match event {
            MapEvent::Snapshot(snapshot) => self.on_snapshot(snapshot),
            MapEvent::Pick(hits) => self.on_pick(&hits),
            MapEvent::StreamError(reason) => {
                warn!("Snapshot stream failed, keeping last render: {}", reason);
                self.stream_failed = true;
            }
        }
    }

    /// Drain `events` until every sender is gone, then hand the view back
    pub async fn run(mut self, mut events: mpsc::Receiver<MapEvent>) -> Self {
        while let Some(event) = events.recv().await {
            self.handle(event);
        }
        info!("Map event queue closed");
        self
    }

    fn on_snapshot(&mut self, snapshot: Option<StateVectorResponse>) {
        match snapshot {
            Some(snapshot) if snapshot.states.is_some() => {
                self.last_snapshot = Some(snapshot);
                self.redraw();
            }
            _ => debug!("No state vectors this cycle, keeping previous render"),
        }
    }

    fn on_pick(&mut self, hits: &[PickedFeature]) {
        let Some(picked_id) = SelectionController::picked_id(hits) else {
            debug!("Pick without usable features ignored");
            return;
        };

        self.selection =
            SelectionController::on_pick(&self.selection, picked_id, self.last_snapshot.as_ref());
        self.redraw();
    }

    fn redraw(&mut self) {
        let Some(snapshot) = &self.last_snapshot else {
            return;
        };

        let render_set = self.renderer.render(snapshot, &self.selection);
        debug!(
            time = snapshot.time,
            features = render_set.len(),
            selected = ?self.selection.selected(),
            "Redrawing map"
        );
        self.sink.draw(&render_set);
        self.render_set = Some(render_set);
    }
}
