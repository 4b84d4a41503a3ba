pub mod fetch;
pub mod serve;
pub mod watch;

pub use fetch::handle_fetch;
pub use serve::handle_serve;
pub use watch::handle_watch;

use anyhow::Result;
use clap::Args;
use skyrelay::StateVectorsRequest;

/// Filters shared by `fetch` and `watch`
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Unix time of the snapshot; defaults to now
    #[arg(long)]
    pub time: Option<i64>,
    /// ICAO 24-bit address (hex) of a single aircraft
    #[arg(long)]
    pub icao24: Option<String>,
    /// Bounding box as four numbers: lamin lomin lamax lomax
    #[arg(long, num_args = 4, value_names = ["LAMIN", "LOMIN", "LAMAX", "LOMAX"], allow_negative_numbers = true)]
    pub bbox: Option<Vec<f64>>,
}

impl QueryArgs {
    pub fn to_request(&self) -> Result<StateVectorsRequest> {
        let mut request = StateVectorsRequest {
            time: self.time,
            icao24: self.icao24.clone(),
            ..Default::default()
        };

        if let Some(bbox) = &self.bbox
            && let [lamin, lomin, lamax, lomax] = bbox.as_slice()
        {
            request.lamin = Some(*lamin);
            request.lomin = Some(*lomin);
            request.lamax = Some(*lamax);
            request.lomax = Some(*lomax);
        }

        request.validate().map_err(anyhow::Error::msg)?;
        Ok(request)
    }
}
