//! Configuration management for the gambit host.
//!
//! Settings are read from a TOML file. A missing file is created with the
//! defaults so the next run has something to edit.

use match_coordinator::{CoordinatorConfig, GameKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Settings handed to every match coordinator
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Simulated client settings
    #[serde(default)]
    pub simulation: SimulationSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Controls the self-contained match simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSettings {
    /// Number of clients; they pair up two per match
    #[serde(default = "default_clients")]
    pub clients: usize,
    /// Slug of the game every client plays
    #[serde(default = "default_game")]
    pub game: String,
    /// Stop a match after this many plies even if it has not ended
    #[serde(default = "default_max_plies")]
    pub max_plies: usize,
    /// Pause before each simulated move, in milliseconds
    #[serde(default = "default_move_interval_ms")]
    pub move_interval_ms: u64,
}

fn default_clients() -> usize {
    4
}

fn default_game() -> String {
    GameKind::Chess.slug().to_string()
}

fn default_max_plies() -> usize {
    200
}

fn default_move_interval_ms() -> u64 {
    50
}

impl SimulationSettings {
    pub fn move_interval(&self) -> Duration {
        Duration::from_millis(self.move_interval_ms)
    }

    /// The configured game, if the slug is known.
    pub fn game_kind(&self) -> Option<GameKind> {
        GameKind::from_slug(&self.game)
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            clients: default_clients(),
            game: default_game(),
            max_plies: default_max_plies(),
            move_interval_ms: default_move_interval_ms(),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::default(),
            simulation: SimulationSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration there and
    /// returns it.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration settings.
    pub fn validate(&self) -> Result<(), String> {
        self.coordinator.validate()?;

        if self.simulation.clients == 0 {
            return Err("simulation.clients must be greater than 0".to_string());
        }
        if self.simulation.clients % 2 != 0 {
            return Err(format!(
                "simulation.clients must be even to pair every client, got {}",
                self.simulation.clients
            ));
        }
        if self.simulation.game_kind().is_none() {
            let known: Vec<&str> = GameKind::ALL.iter().map(|kind| kind.slug()).collect();
            return Err(format!(
                "Unknown game: {}. Must be one of: {known:?}",
                self.simulation.game
            ));
        }
        if self.simulation.max_plies == 0 {
            return Err("simulation.max_plies must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{NamedTempFile, TempDir};
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.simulation.clients, 4);
        assert_eq!(config.simulation.game, "chess");
        assert_eq!(config.simulation.max_plies, 200);
        assert_eq!(config.simulation.move_interval(), Duration::from_millis(50));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.coordinator, CoordinatorConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.simulation.clients = 0;
        assert!(config.validate().is_err());

        config.simulation.clients = 3;
        let err = config.validate().unwrap_err();
        assert!(err.contains("even"));

        let mut config = AppConfig::default();
        config.simulation.game = "checkers".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.contains("checkers"));

        let mut config = AppConfig::default();
        config.coordinator.inbox_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tictactoe_slug_is_accepted() {
        let mut config = AppConfig::default();
        config.simulation.game = "tictactoe".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.simulation.game_kind(), Some(GameKind::TicTacToe));
    }

    #[tokio::test]
    async fn test_load_existing_file() {
        let file = NamedTempFile::new().unwrap();
        let content = r#"
[simulation]
clients = 6
game = "tictactoe"

[logging]
level = "debug"
"#;
        fs::write(file.path(), content).await.unwrap();

        let config = AppConfig::load_from_file(&file.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(config.simulation.clients, 6);
        assert_eq!(config.simulation.game, "tictactoe");
        assert_eq!(config.simulation.max_plies, 200);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.coordinator.presence_channel, "online-players");
    }

    #[tokio::test]
    async fn test_missing_file_writes_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gambit.toml");
        assert!(!path.exists());

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert!(path.exists());
        assert_eq!(config.simulation.clients, 4);

        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.simulation.game, config.simulation.game);
        assert_eq!(reloaded.coordinator, config.coordinator);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_an_error() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), "[simulation\nclients = ").await.unwrap();
        assert!(AppConfig::load_from_file(&file.path().to_path_buf()).await.is_err());
    }
}
