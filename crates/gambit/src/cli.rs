//! Command-line interface handling for the gambit host.
//!
//! Flags given here override the values loaded from the configuration file.

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the number of simulated clients
    pub clients: Option<usize>,
    /// Optional override for the game slug
    pub game: Option<String>,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    pub fn parse() -> Self {
        let matches = Command::new("Gambit Match Host")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Runs simulated clients through matchmaking and online play")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("gambit.toml"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("clients")
                    .short('n')
                    .long("clients")
                    .value_name("COUNT")
                    .help("Number of simulated clients (must be even)")
                    .value_parser(value_parser!(usize)),
            )
            .arg(
                Arg::new("game")
                    .short('g')
                    .long("game")
                    .value_name("SLUG")
                    .help("Game to play (chess, tictactoe)"),
            )
            .get_matches();

        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("gambit.toml")),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            clients: matches.get_one::<usize>("clients").copied(),
            game: matches.get_one::<String>("game").cloned(),
        }
    }
}
