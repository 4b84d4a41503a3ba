use anyhow::{Context, Result};
use std::io::IsTerminal;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::log_format::RelayLogFormat;

/// Initialize Sentry when `SENTRY_DSN` is set.
///
/// The returned guard flushes pending events on drop and must be held for the
/// lifetime of the process.
pub fn init_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN")
        .ok()
        .filter(|dsn| !dsn.trim().is_empty())?;

    let guard = sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: std::env::var("SKYRELAY_ENV").ok().map(Into::into),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Install the global tracing subscriber.
///
/// Filtering follows `RUST_LOG` and defaults to `info`. Logs go to stderr so
/// `fetch` and `watch` can write data to stdout.
pub fn init_tracing(with_sentry: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let ansi = std::io::stderr().is_terminal();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .event_format(RelayLogFormat::new(ansi))
        .with_writer(std::io::stderr);

    let sentry_layer = with_sentry.then(|| sentry_tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(sentry_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    if with_sentry {
        info!("Sentry error reporting enabled");
    }

    Ok(())
}
