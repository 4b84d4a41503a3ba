//! Snapshot to GeoJSON rendering.
//!
//! A [`RenderSet`] is a GeoJSON `FeatureCollection` with one `Point` feature
//! per aircraft that has a position. Every feature carries the aircraft's
//! attributes as a flat property bag keyed `flight.*`, a `flight.selected`
//! flag, and an `icon_rotate` value when a heading is known.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;

use super::selection::SelectionState;
use crate::state_vectors::{StateVector, StateVectorResponse};

pub const PROP_ICAO24: &str = "flight.icao24";
pub const PROP_CALLSIGN: &str = "flight.callsign";
pub const PROP_ORIGIN_COUNTRY: &str = "flight.origin_country";
pub const PROP_TIME_POSITION: &str = "flight.time_position";
pub const PROP_LAST_CONTACT: &str = "flight.last_contact";
pub const PROP_LONGITUDE: &str = "flight.longitude";
pub const PROP_LATITUDE: &str = "flight.latitude";
pub const PROP_BARO_ALTITUDE: &str = "flight.baro_altitude";
pub const PROP_ON_GROUND: &str = "flight.on_ground";
pub const PROP_VELOCITY: &str = "flight.velocity";
pub const PROP_TRUE_TRACK: &str = "flight.true_track";
pub const PROP_VERTICAL_RATE: &str = "flight.vertical_rate";
pub const PROP_GEO_ALTITUDE: &str = "flight.geo_altitude";
pub const PROP_SQUAWK: &str = "flight.squawk";
pub const PROP_SPI: &str = "flight.spi";
pub const PROP_POSITION_SOURCE: &str = "flight.position_source";
pub const PROP_SELECTED: &str = "flight.selected";
pub const PROP_ICON_ROTATE: &str = "icon_rotate";

/// How a heading maps onto the map library's icon rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationConvention {
    /// Rotation equals heading (degrees clockwise from north)
    #[default]
    Clockwise,
    /// Rotation is the negated heading
    CounterClockwise,
}

impl RotationConvention {
    pub fn rotation(self, heading: f64) -> f64 {
        match self {
            RotationConvention::Clockwise => heading,
            RotationConvention::CounterClockwise => -heading,
        }
    }
}

impl fmt::Display for RotationConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationConvention::Clockwise => write!(f, "clockwise"),
            RotationConvention::CounterClockwise => write!(f, "counter_clockwise"),
        }
    }
}

impl FromStr for RotationConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "clockwise" | "cw" => Ok(RotationConvention::Clockwise),
            "counter_clockwise" | "ccw" => Ok(RotationConvention::CounterClockwise),
            other => Err(format!(
                "unknown rotation convention '{}' (expected clockwise or counter_clockwise)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointGeometry {
    #[serde(rename = "type")]
    kind: &'static str,
    /// `[longitude, latitude]`
    pub coordinates: [f64; 2],
}

/// One aircraft as a GeoJSON point feature
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFeature {
    #[serde(rename = "type")]
    kind: &'static str,
    pub geometry: PointGeometry,
    pub properties: Map<String, Value>,
}

impl RenderFeature {
    pub fn icao24(&self) -> Option<&str> {
        self.properties.get(PROP_ICAO24).and_then(Value::as_str)
    }

    pub fn is_selected(&self) -> bool {
        self.properties
            .get(PROP_SELECTED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn rotation(&self) -> Option<f64> {
        self.properties.get(PROP_ICON_ROTATE).and_then(Value::as_f64)
    }

    pub fn longitude(&self) -> f64 {
        self.geometry.coordinates[0]
    }

    pub fn latitude(&self) -> f64 {
        self.geometry.coordinates[1]
    }
}

/// The full feature collection handed to the map on every redraw
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderSet {
    #[serde(rename = "type")]
    kind: &'static str,
    pub features: Vec<RenderFeature>,
}

impl Default for RenderSet {
    fn default() -> Self {
        Self {
            kind: "FeatureCollection",
            features: Vec::new(),
        }
    }
}

impl RenderSet {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn selected_feature(&self) -> Option<&RenderFeature> {
        self.features.iter().find(|f| f.is_selected())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Builds render sets from snapshots and the current selection
#[derive(Debug, Clone, Copy, Default)]
pub struct SnapshotRenderer {
    rotation: RotationConvention,
}

impl SnapshotRenderer {
    pub fn new(rotation: RotationConvention) -> Self {
        Self { rotation }
    }

    /// Render every positioned record of `snapshot`, flagging the selected one.
    ///
    /// Records missing either coordinate are skipped. A snapshot without
    /// states renders as an empty collection.
    pub fn render(&self, snapshot: &StateVectorResponse, selection: &SelectionState) -> RenderSet {
        let features = snapshot
            .states
            .iter()
            .flatten()
            .filter_map(|state| self.render_state(state, selection))
            .collect();

        RenderSet {
            kind: "FeatureCollection",
            features,
        }
    }

    fn render_state(&self, state: &StateVector, selection: &SelectionState) -> Option<RenderFeature> {
        let (longitude, latitude) = state.position()?;

        let mut properties = Map::new();
        properties.insert(PROP_ICAO24.into(), json!(state.icao24));
        properties.insert(PROP_CALLSIGN.into(), json!(state.callsign));
        properties.insert(PROP_ORIGIN_COUNTRY.into(), json!(state.origin_country));
        properties.insert(PROP_TIME_POSITION.into(), json!(state.time_position));
        properties.insert(PROP_LAST_CONTACT.into(), json!(state.last_contact));
        properties.insert(PROP_LONGITUDE.into(), json!(longitude));
        properties.insert(PROP_LATITUDE.into(), json!(latitude));
        properties.insert(PROP_BARO_ALTITUDE.into(), json!(state.baro_altitude));
        properties.insert(PROP_ON_GROUND.into(), json!(state.on_ground));
        properties.insert(PROP_VELOCITY.into(), json!(state.velocity));
        properties.insert(PROP_TRUE_TRACK.into(), json!(state.true_track));
        properties.insert(PROP_VERTICAL_RATE.into(), json!(state.vertical_rate));
        properties.insert(PROP_GEO_ALTITUDE.into(), json!(state.geo_altitude));
        properties.insert(PROP_SQUAWK.into(), json!(state.squawk));
        properties.insert(PROP_SPI.into(), json!(state.spi));
        properties.insert(
            PROP_POSITION_SOURCE.into(),
            json!(state.position_source.to_string()),
        );
        properties.insert(
            PROP_SELECTED.into(),
            json!(selection.matches(state.icao24.as_deref())),
        );

        if let Some(heading) = state.true_track.filter(|h| h.is_finite()) {
            properties.insert(
                PROP_ICON_ROTATE.into(),
                json!(self.rotation.rotation(heading)),
            );
        }

        Some(RenderFeature {
            kind: "Feature",
            geometry: PointGeometry {
                kind: "Point",
                coordinates: [longitude, latitude],
            },
            properties,
        })
    }
}
