use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use skyrelay::config::{self, AppConfig};
use skyrelay::map_view::RotationConvention;
use skyrelay::telemetry;

mod commands;

use commands::QueryArgs;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser)]
#[command(name = "skyrelay")]
#[command(version)]
#[command(about = "Relay live OpenSky aircraft state vectors as server-sent events")]
struct Cli {
    /// Path to the TOML config file (else SKYRELAY_CONFIG, else ./skyrelay.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve `/states/all` as a server-sent event stream
    Serve {
        /// Interface to bind to
        #[arg(long)]
        interface: Option<String>,
        /// Port to listen on
        #[arg(long, env = "SKYRELAY_PORT")]
        port: Option<u16>,
        /// Seconds between upstream polls
        #[arg(long)]
        refresh_interval: Option<u64>,
        /// JSON file with upstream `username` and `password`
        #[arg(long)]
        credentials_file: Option<PathBuf>,
        /// Upstream API base URL
        #[arg(long)]
        upstream: Option<String>,
    },
    /// Query the upstream API once and print the snapshot as JSON
    Fetch {
        #[command(flatten)]
        query: QueryArgs,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Subscribe to a running relay and render each snapshot
    Watch {
        /// Base URL of the relay
        #[arg(long, default_value = "http://127.0.0.1:5000")]
        relay: String,
        #[command(flatten)]
        query: QueryArgs,
        /// Print every render as a GeoJSON line on stdout
        #[arg(long)]
        geojson: bool,
        /// Heading to icon rotation convention (clockwise or counter-clockwise)
        #[arg(long)]
        rotation: Option<RotationConvention>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let sentry_guard = telemetry::init_sentry();
    telemetry::init_tracing(sentry_guard.is_some())?;

    let config_path = config::config_path(cli.config);
    let mut config = AppConfig::load_or_default(config_path.as_deref())?;
    match &config_path {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("No config file found, using defaults"),
    }

    match cli.command {
        Commands::Serve {
            interface,
            port,
            refresh_interval,
            credentials_file,
            upstream,
        } => {
            if let Some(interface) = interface {
                config.server.interface = interface;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(seconds) = refresh_interval {
                config.upstream.refresh_interval_seconds = seconds;
            }
            if let Some(path) = credentials_file {
                config.upstream.credentials_file = Some(path);
            }
            if let Some(base_url) = upstream {
                config.upstream.base_url = base_url;
            }
            config.validate()?;

            commands::handle_serve(config).await
        }
        Commands::Fetch { query, pretty } => {
            commands::handle_fetch(config, query.to_request()?, pretty).await
        }
        Commands::Watch {
            relay,
            query,
            geojson,
            rotation,
        } => {
            let rotation = rotation.unwrap_or(config.view.rotation);
            commands::handle_watch(relay, query.to_request()?, rotation, geojson).await
        }
    }
}
