use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Credentials;
use crate::poller::StateVectorSource;
use crate::state_vectors::{
    PositionSource, StateVector, StateVectorResponse, StateVectorsRequest,
};

pub const DEFAULT_BASE_URL: &str = "https://opensky-network.org/api";

/// Number of positional fields in an upstream state row we rely on
const STATE_ROW_FIELDS: usize = 17;

/// OpenSky Network REST client for live state vectors
#[derive(Clone)]
pub struct OpenSkyClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    timeout: Duration,
}

/// Body of `GET /states/all`; each state is a positional array
#[derive(Debug, Deserialize)]
struct RawStatesResponse {
    time: i64,
    #[serde(default)]
    states: Option<Vec<Value>>,
}

impl OpenSkyClient {
    /// Create a new client against `base_url` (e.g. `https://opensky-network.org/api`)
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.credentials.is_some()
    }

    /// Fetch all state vectors matching `request`
    ///
    /// # Arguments
    /// * `request` - Optional time cursor, ICAO address and bounding box filters
    pub async fn get_all_state_vectors(
        &self,
        request: &StateVectorsRequest,
    ) -> Result<StateVectorResponse> {
        let url = format!("{}/states/all", self.base_url);

        debug!("Fetching state vectors ({})", request);

        let mut builder = self
            .client
            .get(&url)
            .query(&request.to_query())
            .timeout(self.timeout);

        if let Some(credentials) = &self.credentials {
            builder = builder.basic_auth(&credentials.username, Some(&credentials.password));
        }

        let response = builder
            .send()
            .await
            .context("Failed to send request to OpenSky API")?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            warn!("Rate limited by OpenSky API");
            return Err(anyhow!("Rate limited by OpenSky API"));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("OpenSky API error {}: {}", status, body));
        }

        let response_text = response
            .text()
            .await
            .context("Failed to read response body")?;

        let raw: RawStatesResponse = serde_json::from_str(&response_text).with_context(|| {
            format!(
                "Failed to parse OpenSky API response. Response: {}",
                &response_text.chars().take(500).collect::<String>()
            )
        })?;

        let response = convert_response(raw);

        debug!(
            "Fetched {} state vectors for time {}",
            response.len(),
            response.time
        );

        Ok(response)
    }
}

#[async_trait]
impl StateVectorSource for OpenSkyClient {
    async fn fetch_state_vectors(&self, request: &StateVectorsRequest) -> Result<StateVectorResponse> {
        self.get_all_state_vectors(request).await
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}

fn convert_response(raw: RawStatesResponse) -> StateVectorResponse {
    let states = raw.states.map(|rows| {
        rows.iter()
            .filter_map(|row| {
                let state = convert_state_row(row);
                if state.is_none() {
                    debug!("Skipping malformed state row: {}", row);
                }
                state
            })
            .collect()
    });

    StateVectorResponse {
        time: raw.time,
        states,
    }
}

/// Convert one positional upstream row into a [`StateVector`]
///
/// Field order: icao24, callsign, origin_country, time_position, last_contact,
/// longitude, latitude, baro_altitude, on_ground, velocity, true_track,
/// vertical_rate, sensors, geo_altitude, squawk, spi, position_source.
/// Trailing fields beyond these are ignored.
fn convert_state_row(row: &Value) -> Option<StateVector> {
    let fields = row.as_array()?;
    if fields.len() < STATE_ROW_FIELDS {
        return None;
    }

    Some(StateVector {
        icao24: string_field(&fields[0]),
        callsign: string_field(&fields[1])
            .map(|cs| cs.trim_end().to_string())
            .filter(|cs| !cs.is_empty()),
        origin_country: string_field(&fields[2]),
        time_position: fields[3].as_i64(),
        last_contact: fields[4].as_i64(),
        longitude: fields[5].as_f64(),
        latitude: fields[6].as_f64(),
        baro_altitude: fields[7].as_f64(),
        on_ground: fields[8].as_bool().unwrap_or(false),
        velocity: fields[9].as_f64(),
        true_track: fields[10].as_f64(),
        vertical_rate: fields[11].as_f64(),
        sensors: fields[12]
            .as_array()
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect()),
        geo_altitude: fields[13].as_f64(),
        squawk: string_field(&fields[14]),
        spi: fields[15].as_bool().unwrap_or(false),
        position_source: PositionSource::from_code(fields[16].as_i64()),
    })
}

fn string_field(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}
