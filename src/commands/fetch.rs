use anyhow::{Context, Result};
use tracing::info;

use skyrelay::{AppConfig, StateVectorsRequest};

/// One-shot upstream query; prints the snapshot JSON to stdout
pub async fn handle_fetch(
    config: AppConfig,
    request: StateVectorsRequest,
    pretty: bool,
) -> Result<()> {
    let client = super::serve::build_upstream_client(&config)?;

    let snapshot = client
        .get_all_state_vectors(&request)
        .await
        .with_context(|| format!("Failed to fetch state vectors ({})", request))?;

    info!(
        "Fetched {} state vectors at time {}",
        snapshot.len(),
        snapshot.time
    );

    let json = if pretty {
        serde_json::to_string_pretty(&snapshot)
    } else {
        serde_json::to_string(&snapshot)
    }
    .context("Failed to serialize snapshot")?;

    println!("{}", json);
    Ok(())
}

