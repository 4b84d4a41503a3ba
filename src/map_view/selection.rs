use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::identifier::{is_blank, same_aircraft};
use super::render::PROP_ICAO24;
use crate::state_vectors::StateVectorResponse;

/// The single highlighted aircraft, or none
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    selected: Option<String>,
}

impl SelectionState {
    pub fn none() -> Self {
        Self { selected: None }
    }

    pub fn of(icao24: impl Into<String>) -> Self {
        Self {
            selected: Some(icao24.into()),
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.selected.is_none()
    }

    /// Whether `icao24` names the selected aircraft
    pub fn matches(&self, icao24: Option<&str>) -> bool {
        same_aircraft(self.selected(), icao24)
    }
}

/// A feature hit by a pick, carrying the rendered property bag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PickedFeature {
    pub properties: Map<String, Value>,
}

impl PickedFeature {
    pub fn new(properties: Map<String, Value>) -> Self {
        Self { properties }
    }

    /// A hit carrying nothing but the identifier property
    pub fn with_icao24(icao24: &str) -> Self {
        let mut properties = Map::new();
        properties.insert(PROP_ICAO24.to_string(), Value::String(icao24.to_string()));
        Self { properties }
    }

    pub fn icao24(&self) -> Option<&str> {
        self.properties.get(PROP_ICAO24).and_then(Value::as_str)
    }
}

/// Turns pick-events into selection changes
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionController;

impl SelectionController {
    /// Identifier of the first hit, which wins ties between overlapping features
    pub fn picked_id(hits: &[PickedFeature]) -> Option<&str> {
        hits.first()
            .and_then(PickedFeature::icao24)
            .filter(|id| !is_blank(Some(id)))
    }

    /// Apply toggle semantics: picking the selected aircraft deselects it,
    /// picking any other aircraft selects that one instead.
    ///
    /// `last_snapshot` is context only; a pick is honoured even if the
    /// aircraft has since left the snapshot.
    pub fn on_pick(
        current: &SelectionState,
        picked_id: &str,
        last_snapshot: Option<&StateVectorResponse>,
    ) -> SelectionState {
        if current.matches(Some(picked_id)) {
            debug!("Deselecting aircraft {}", picked_id);
            return SelectionState::none();
        }

        let known = last_snapshot
            .and_then(|snapshot| snapshot.states.as_ref())
            .is_some_and(|states| {
                states
                    .iter()
                    .any(|state| same_aircraft(state.icao24.as_deref(), Some(picked_id)))
            });
        if !known {
            debug!("Picked aircraft {} is not in the last snapshot", picked_id);
        }

        debug!("Selecting aircraft {}", picked_id);
        SelectionState::of(picked_id)
    }
}
