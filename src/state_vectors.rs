//! State vector contracts shared by the relay and its consumers.
//!
//! These are the shapes pushed over the event stream: a [`StateVectorResponse`]
//! per successful poll, each carrying the [`StateVector`]s of one upstream
//! snapshot. Field names are fixed by the OpenSky API.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Origin of a state vector's position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PositionSource {
    #[default]
    Unknown,
    #[serde(rename = "ASBD")]
    Asbd,
    #[serde(rename = "ASTERIX")]
    Asterix,
    #[serde(rename = "MLAT")]
    Mlat,
}

impl PositionSource {
    /// Map the upstream numeric code (0 = ADS-B, 1 = ASTERIX, 2 = MLAT)
    pub fn from_code(code: Option<i64>) -> Self {
        match code {
            Some(0) => PositionSource::Asbd,
            Some(1) => PositionSource::Asterix,
            Some(2) => PositionSource::Mlat,
            _ => PositionSource::Unknown,
        }
    }
}

impl fmt::Display for PositionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSource::Unknown => write!(f, "Unknown"),
            PositionSource::Asbd => write!(f, "ASBD"),
            PositionSource::Asterix => write!(f, "ASTERIX"),
            PositionSource::Mlat => write!(f, "MLAT"),
        }
    }
}

/// One aircraft's reported state within a snapshot
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateVector {
    /// ICAO 24-bit transponder address as a hex string
    pub icao24: Option<String>,
    /// Callsign, absent if none has been received
    pub callsign: Option<String>,
    /// Country inferred from the ICAO address
    pub origin_country: Option<String>,
    /// Unix seconds of the last position update
    pub time_position: Option<i64>,
    /// Unix seconds of the last message of any kind
    pub last_contact: Option<i64>,
    /// WGS-84 longitude in decimal degrees
    pub longitude: Option<f64>,
    /// WGS-84 latitude in decimal degrees
    pub latitude: Option<f64>,
    /// Barometric altitude in meters
    pub baro_altitude: Option<f64>,
    #[serde(default)]
    pub on_ground: bool,
    /// Ground speed in m/s
    pub velocity: Option<f64>,
    /// Degrees clockwise from north
    pub true_track: Option<f64>,
    /// Climb (positive) or descent rate in m/s
    pub vertical_rate: Option<f64>,
    pub sensors: Option<Vec<i64>>,
    /// Geometric altitude in meters
    pub geo_altitude: Option<f64>,
    pub squawk: Option<String>,
    /// Special purpose indicator
    #[serde(default)]
    pub spi: bool,
    #[serde(default)]
    pub position_source: PositionSource,
}

impl StateVector {
    /// Both coordinates, if present and finite
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => Some((lon, lat)),
            _ => None,
        }
    }
}

/// One timestamped batch of state vectors
///
/// `states` is `None` when the upstream reported no aircraft for the query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateVectorResponse {
    /// All vectors describe the interval `[time - 1, time]`
    pub time: i64,
    pub states: Option<Vec<StateVector>>,
}

#[derive(Deserialize)]
struct LenientResponse {
    time: i64,
    #[serde(default)]
    states: Option<Vec<serde_json::Value>>,
}

impl StateVectorResponse {
    /// Parse an event payload, dropping individual records that do not decode
    pub fn from_json(payload: &str) -> Result<Self> {
        let raw: LenientResponse =
            serde_json::from_str(payload).context("Failed to parse state vector payload")?;

        let states = raw.states.map(|rows| {
            rows.into_iter()
                .filter_map(|row| match serde_json::from_value::<StateVector>(row) {
                    Ok(state) => Some(state),
                    Err(e) => {
                        debug!("Dropping malformed state vector: {}", e);
                        None
                    }
                })
                .collect()
        });

        Ok(Self {
            time: raw.time,
            states,
        })
    }

    pub fn len(&self) -> usize {
        self.states.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Rectangular latitude/longitude filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lamin: f64,
    pub lomin: f64,
    pub lamax: f64,
    pub lomax: f64,
}

/// Query accepted by the relay endpoint and forwarded upstream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateVectorsRequest {
    /// Unix seconds; upstream defaults to "now"
    pub time: Option<i64>,
    pub icao24: Option<String>,
    pub lamin: Option<f64>,
    pub lomin: Option<f64>,
    pub lamax: Option<f64>,
    pub lomax: Option<f64>,
}

impl StateVectorsRequest {
    /// The bounding box, only when all four edges are given
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        match (self.lamin, self.lomin, self.lamax, self.lomax) {
            (Some(lamin), Some(lomin), Some(lamax), Some(lomax)) => Some(BoundingBox {
                lamin,
                lomin,
                lamax,
                lomax,
            }),
            _ => None,
        }
    }

    /// The identifier filter, ignoring blank values
    pub fn icao24(&self) -> Option<&str> {
        self.icao24
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Check coordinate ranges and the time cursor
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(time) = self.time
            && time < 0
        {
            return Err("time must not be negative".to_string());
        }

        for (name, value) in [("lamin", self.lamin), ("lamax", self.lamax)] {
            if let Some(v) = value
                && !(-90.0..=90.0).contains(&v)
            {
                return Err(format!("{} must be between -90 and 90", name));
            }
        }

        for (name, value) in [("lomin", self.lomin), ("lomax", self.lomax)] {
            if let Some(v) = value
                && !(-180.0..=180.0).contains(&v)
            {
                return Err(format!("{} must be between -180 and 180", name));
            }
        }

        Ok(())
    }

    /// Query pairs in the upstream's parameter names
    pub fn to_query(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();

        if let Some(time) = self.time {
            params.push(("time", time.to_string()));
        }

        if let Some(icao24) = self.icao24() {
            params.push(("icao24", icao24.to_lowercase()));
        }

        if let Some(bbox) = self.bounding_box() {
            params.push(("lamin", bbox.lamin.to_string()));
            params.push(("lomin", bbox.lomin.to_string()));
            params.push(("lamax", bbox.lamax.to_string()));
            params.push(("lomax", bbox.lomax.to_string()));
        }

        params
    }
}

impl fmt::Display for StateVectorsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "time = {:?}, icao24 = {:?}, bb({:?},{:?},{:?},{:?})",
            self.time, self.icao24, self.lamin, self.lomin, self.lamax, self.lomax
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_source_codes() {
        assert_eq!(PositionSource::from_code(Some(0)), PositionSource::Asbd);
        assert_eq!(PositionSource::from_code(Some(1)), PositionSource::Asterix);
        assert_eq!(PositionSource::from_code(Some(2)), PositionSource::Mlat);
        assert_eq!(PositionSource::from_code(Some(3)), PositionSource::Unknown);
        assert_eq!(PositionSource::from_code(None), PositionSource::Unknown);
    }

    #[test]
    fn test_position_source_serializes_by_name() {
        let json = serde_json::to_string(&PositionSource::Asbd).unwrap();
        assert_eq!(json, "\"ASBD\"");
        let parsed: PositionSource = serde_json::from_str("\"MLAT\"").unwrap();
        assert_eq!(parsed, PositionSource::Mlat);
    }

    #[test]
    fn test_state_vector_serializes_with_upstream_field_names() {
        let state = StateVector {
            icao24: Some("3c6444".to_string()),
            callsign: Some("DLH9LF".to_string()),
            longitude: Some(7.6),
            latitude: Some(51.9),
            position_source: PositionSource::Asbd,
            ..Default::default()
        };

        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["icao24"], "3c6444");
        assert_eq!(value["callsign"], "DLH9LF");
        assert_eq!(value["baro_altitude"], serde_json::Value::Null);
        assert_eq!(value["on_ground"], false);
        assert_eq!(value["position_source"], "ASBD");
    }

    #[test]
    fn test_position_requires_both_coordinates() {
        let mut state = StateVector {
            longitude: Some(10.0),
            ..Default::default()
        };
        assert_eq!(state.position(), None);

        state.latitude = Some(20.0);
        assert_eq!(state.position(), Some((10.0, 20.0)));

        state.latitude = Some(f64::NAN);
        assert_eq!(state.position(), None);
    }

    #[test]
    fn test_from_json_drops_malformed_records() {
        let payload = r#"{
            "time": 100,
            "states": [
                {"icao24": "abc", "longitude": 7.6, "latitude": 51.9},
                {"icao24": "def", "longitude": "east", "latitude": 51.9},
                {"icao24": "123", "longitude": 8.0, "latitude": 52.0, "position_source": "MLAT"}
            ]
        }"#;

        let response = StateVectorResponse::from_json(payload).unwrap();
        assert_eq!(response.time, 100);
        assert_eq!(response.len(), 2);
        let states = response.states.unwrap();
        assert_eq!(states[0].icao24.as_deref(), Some("abc"));
        assert_eq!(states[1].position_source, PositionSource::Mlat);
    }

    #[test]
    fn test_from_json_keeps_null_states() {
        let response = StateVectorResponse::from_json(r#"{"time": 5, "states": null}"#).unwrap();
        assert_eq!(response.states, None);
        assert!(response.is_empty());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(StateVectorResponse::from_json("not json").is_err());
        assert!(StateVectorResponse::from_json(r#"{"states": []}"#).is_err());
    }

    #[test]
    fn test_bounding_box_needs_all_edges() {
        let mut request = StateVectorsRequest {
            lamin: Some(45.8),
            lomin: Some(5.9),
            lamax: Some(47.8),
            ..Default::default()
        };
        assert_eq!(request.bounding_box(), None);

        request.lomax = Some(10.5);
        assert_eq!(
            request.bounding_box(),
            Some(BoundingBox {
                lamin: 45.8,
                lomin: 5.9,
                lamax: 47.8,
                lomax: 10.5
            })
        );
    }

    #[test]
    fn test_to_query_skips_blank_icao24_and_partial_box() {
        let request = StateVectorsRequest {
            time: Some(1_458_564_121),
            icao24: Some("  ".to_string()),
            lamin: Some(45.8),
            ..Default::default()
        };

        assert_eq!(request.to_query(), vec![("time", "1458564121".to_string())]);
    }

    #[test]
    fn test_to_query_lowercases_icao24() {
        let request = StateVectorsRequest {
            icao24: Some("3C6444".to_string()),
            lamin: Some(45.8),
            lomin: Some(5.9),
            lamax: Some(47.8),
            lomax: Some(10.5),
            ..Default::default()
        };

        assert_eq!(
            request.to_query(),
            vec![
                ("icao24", "3c6444".to_string()),
                ("lamin", "45.8".to_string()),
                ("lomin", "5.9".to_string()),
                ("lamax", "47.8".to_string()),
                ("lomax", "10.5".to_string()),
            ]
        );
    }

    #[test]
    fn test_validate_ranges() {
        let ok = StateVectorsRequest {
            lamin: Some(-90.0),
            lomax: Some(180.0),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_lat = StateVectorsRequest {
            lamax: Some(91.0),
            ..Default::default()
        };
        assert!(bad_lat.validate().unwrap_err().contains("lamax"));

        let bad_lon = StateVectorsRequest {
            lomin: Some(-181.0),
            ..Default::default()
        };
        assert!(bad_lon.validate().unwrap_err().contains("lomin"));

        let bad_time = StateVectorsRequest {
            time: Some(-1),
            ..Default::default()
        };
        assert!(bad_time.validate().is_err());
    }
}
