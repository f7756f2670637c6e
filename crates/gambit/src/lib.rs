//! # Gambit - Match Host
//!
//! Runnable host for the match coordinator. It loads configuration, sets up
//! logging and drives a group of simulated clients through presence,
//! matchmaking and online play on a shared in-memory backend.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! gambit
//!
//! # Specify custom configuration
//! gambit --config tournament.toml
//!
//! # Override specific settings
//! gambit --clients 8 --game tictactoe --log-level debug
//!
//! # JSON logging
//! gambit --json-logs
//! ```
//!
//! ## Configuration
//!
//! Configuration is read from a TOML file (default: `gambit.toml`). If the
//! file doesn't exist, a default configuration is written there.
//!
//! ## Signal Handling
//!
//! SIGINT (Ctrl+C) and SIGTERM stop the simulation; every session is then
//! taken out of its match before the process exits.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the gambit host.
///
/// Called from `main` inside the tokio runtime. Startup or runtime failures
/// are logged and end the process with exit code 1.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Logging comes up before anything else can log.
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

pub use app::ClientReport;
pub use config::{LoggingSettings, SimulationSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_cli_args_structure() {
        let args = CliArgs {
            config_path: PathBuf::from("test.toml"),
            log_level: Some("debug".to_string()),
            json_logs: true,
            clients: Some(2),
            game: Some("chess".to_string()),
        };

        assert_eq!(args.config_path, PathBuf::from("test.toml"));
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert!(args.json_logs);
        assert_eq!(args.clients, Some(2));
    }

    #[tokio::test]
    async fn test_application_creation() {
        let dir = TempDir::new().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("gambit.toml"),
            log_level: None,
            json_logs: false,
            clients: Some(2),
            game: Some("tictactoe".to_string()),
        };

        assert!(Application::new(args.clone()).await.is_ok());
        assert!(args.config_path.exists());
    }

    #[tokio::test]
    async fn test_invalid_override_fails_startup() {
        let dir = TempDir::new().unwrap();
        let args = CliArgs {
            config_path: dir.path().join("gambit.toml"),
            log_level: None,
            json_logs: false,
            clients: Some(3),
            game: None,
        };

        assert!(Application::new(args).await.is_err());
    }
}
