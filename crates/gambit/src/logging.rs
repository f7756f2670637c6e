//! Logging for the simulation host.
//!
//! Every simulated client logs into the same process, so lines carry their
//! target (`gambit` for the drivers, `match_coordinator` for sessions) rather
//! than thread ids, which only name tokio workers shared by all clients.
//! Per-move driver output sits at `debug`; session internals at `trace`.
//!
//! Collected runs use JSON with event fields flattened to the top level so a
//! log processor can group lines by player or match without unwrapping.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter from `RUST_LOG` when set, otherwise from the configured level.
fn build_filter(level: &str) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(level)?),
    }
}

/// Installs the global subscriber.
///
/// `json_format` forces JSON output regardless of the file setting. Fails
/// instead of panicking when a subscriber is already installed, so embedding
/// callers and tests can call it more than once.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let filter = build_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_ansi(true).with_target(true).compact())
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", config.level);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║             ♞ GAMBIT HOST ♞              ║");
    info!("║              version {:<20}║", version);
    info!("║                                          ║");
    info!("║  Turn-based match coordination           ║");
    info!("║  🤝 Race-free matchmaking                ║");
    info!("║  🔁 Self-healing move sync               ║");
    info!("║  👥 Live presence                        ║");
    info!("║                                          ║");
    info!("╚══════════════════════════════════════════╝");
}
