//! Main application logic and lifecycle management.
//!
//! The `Application` spins up a set of simulated clients on one in-memory
//! backend. Every client announces itself on the presence channel, enters
//! matchmaking, and then plays AI-selected moves whenever it holds the turn,
//! until its match ends, the ply limit is reached or a shutdown signal
//! arrives.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, setup_signal_handlers_silent},
};
use match_coordinator::{
    create_memory_backend, AiMoveSelector, Color, GameKind, GameSession, MemoryBackend,
    MoveCandidate, Outcome, PlayerId, PresenceChannel, SessionStatus,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const MATCHMAKING_TIMEOUT: Duration = Duration::from_secs(10);

/// What one simulated client saw by the time it stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientReport {
    pub player: PlayerId,
    pub status: SessionStatus,
    pub color: Option<Color>,
    pub plies: usize,
    pub outcome: Option<Outcome>,
}

/// Main application struct.
pub struct Application {
    config: AppConfig,
    game: GameKind,
    backend: MemoryBackend,
}

impl Application {
    /// Loads configuration, applies CLI overrides and validates the result.
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let config = AppConfig::load_from_file(&args.config_path).await?;
        let config = Self::apply_overrides(config, &args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();
        Self::from_config(config)
    }

    /// Builds an application from an already validated configuration.
    pub fn from_config(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let game = config
            .simulation
            .game_kind()
            .ok_or_else(|| format!("Unknown game: {}", config.simulation.game))?;

        Ok(Self {
            config,
            game,
            backend: create_memory_backend(),
        })
    }

    fn apply_overrides(mut config: AppConfig, args: &CliArgs) -> AppConfig {
        if let Some(log_level) = &args.log_level {
            config.logging.level = log_level.clone();
        }
        if args.json_logs {
            config.logging.json_format = true;
        }
        if let Some(clients) = args.clients {
            config.simulation.clients = clients;
        }
        if let Some(game) = &args.game {
            config.simulation.game = game.clone();
        }
        config
    }

    /// Runs the simulation until every client stops or a shutdown signal
    /// arrives.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting {} simulation", self.game.title());
        self.log_configuration_summary();

        let sessions = self.connect_clients().await?;
        info!(
            "👥 {} clients online",
            sessions.first().map(|s| s.state().online_count).unwrap_or(0)
        );

        info!("🛑 Press Ctrl+C to stop early");
        let finished = tokio::select! {
            reports = self.play(&sessions) => Some(reports),
            result = setup_signal_handlers() => {
                result?;
                None
            }
        };

        // A second signal while sessions are closing skips the cleanup.
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown signal received again, exiting immediately");
            std::process::exit(1);
        });

        match &finished {
            Some(reports) => log_results(reports),
            None => info!("⏹️ Simulation interrupted before every match finished"),
        }

        info!("🧹 Closing {} sessions...", sessions.len());
        for session in sessions {
            if let Err(e) = session.cancel_or_exit().await {
                debug!("Session already left its match: {e}");
            }
            session.shutdown().await;
        }

        info!("✅ Gambit shutdown complete");
        Ok(())
    }

    /// Starts one coordinator per client and sends each into matchmaking.
    async fn connect_clients(&self) -> Result<Vec<GameSession>, Box<dyn std::error::Error>> {
        let presence: Arc<dyn PresenceChannel> = self
            .backend
            .presence
            .channel(&self.config.coordinator.presence_channel);
        let mut sessions = Vec::with_capacity(self.config.simulation.clients);

        for index in 0..self.config.simulation.clients {
            let player = PlayerId::new(format!("player-{}", index + 1));
            let session = GameSession::spawn(
                self.game,
                self.backend.store.clone(),
                self.config.coordinator.clone(),
            )
            .with_presence(presence.clone(), Some(&player))
            .await?;

            session.start_matchmaking(player.clone()).await?;

            // Each client holds a seat before the next one looks for a match,
            // so clients pair up in arrival order.
            let mut state = session.subscribe_state();
            tokio::time::timeout(MATCHMAKING_TIMEOUT, state.wait_for(|s| s.match_id.is_some()))
                .await?
                .map(|_| ())?;
            debug!("🔍 {} holds a seat", player);
            sessions.push(session);
        }

        Ok(sessions)
    }

    async fn play(&self, sessions: &[GameSession]) -> Vec<ClientReport> {
        let drivers = sessions.iter().enumerate().map(|(index, session)| {
            let player = PlayerId::new(format!("player-{}", index + 1));
            drive_client(session, player, &self.config)
        });
        futures::future::join_all(drivers).await
    }

    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🎲 Game: {}", self.game);
        info!("  👥 Clients: {}", self.config.simulation.clients);
        info!("  🔢 Ply limit: {}", self.config.simulation.max_plies);
        info!(
            "  ⏱️ Move interval: {}ms",
            self.config.simulation.move_interval_ms
        );
        info!(
            "  📡 Presence channel: {}",
            self.config.coordinator.presence_channel
        );
    }
}

/// Plays one client's side until its session leaves online play.
async fn drive_client(session: &GameSession, player: PlayerId, config: &AppConfig) -> ClientReport {
    let selector = AiMoveSelector::new();
    let mut state = session.subscribe_state();

    loop {
        let snapshot = state.borrow_and_update().clone();
        let finished = snapshot.status == SessionStatus::Ended
            || snapshot.is_game_over()
            || snapshot.move_history.len() >= config.simulation.max_plies;

        if finished {
            return ClientReport {
                player,
                status: snapshot.status,
                color: snapshot.assigned_color,
                plies: snapshot.move_history.len(),
                outcome: snapshot.outcome,
            };
        }

        if snapshot.status == SessionStatus::Playing && snapshot.is_my_turn() {
            tokio::time::sleep(config.simulation.move_interval()).await;

            let legal = session.legal_moves();
            match selector.select(&legal).map(|choice| choice.notation.clone()) {
                Some(notation) => match session.apply_move(MoveCandidate::notation(notation)).await {
                    Ok(played) => {
                        debug!("♟️ {} played {}", player, played);
                        continue;
                    }
                    Err(e) => debug!("{} could not move: {e}", player),
                },
                None => warn!("{} has no legal move in a live position", player),
            }
        }

        if state.changed().await.is_err() {
            warn!("{}'s session stopped", player);
            return ClientReport {
                player,
                status: snapshot.status,
                color: snapshot.assigned_color,
                plies: snapshot.move_history.len(),
                outcome: snapshot.outcome,
            };
        }
    }
}

fn log_results(reports: &[ClientReport]) {
    info!("📊 Final Results:");
    for report in reports {
        let color = report
            .color
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let outcome = match report.outcome {
            Some(Outcome::Checkmate { winner }) => format!("checkmate, {winner} wins"),
            Some(Outcome::Win { winner }) => format!("{winner} wins"),
            Some(Outcome::Stalemate) => "stalemate".to_string(),
            Some(Outcome::Draw) => "draw".to_string(),
            None => "unfinished".to_string(),
        };
        info!(
            "  {} ({}) - {} after {} plies: {}",
            report.player, color, report.status, report.plies, outcome
        );
    }
}
