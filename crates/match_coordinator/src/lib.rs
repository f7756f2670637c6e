//! # Match Coordinator
//!
//! Session management for two-player turn-based board games: pass-and-play,
//! games against a heuristic AI, and networked matches between independent
//! clients that only share a record store.
//!
//! ## Core Features
//!
//! - **Session State Machine**: `Local`, `Waiting`, `Playing`, `Ai` and
//!   `Ended`, with every illegal transition rejected
//! - **Race-Free Matchmaking**: guest seats are claimed with a conditional
//!   update and an affected-row check
//! - **Move Synchronization**: duplicate and out-of-order notifications are
//!   tolerated; the canonical position always wins
//! - **Presence**: live online count rebuilt from channel snapshots
//! - **AI Opponent**: capture and mate weighted one-ply heuristic
//!
//! ## Architecture Overview
//!
//! The coordinator depends on three seams and ships an in-memory version of
//! each:
//!
//! - [`RulesEngine`] - board legality ([`ChessRules`], [`TicTacToeRules`])
//! - [`MatchStore`] - durable records and change feeds ([`MemoryStore`])
//! - [`PresenceChannel`] - membership feed ([`MemoryPresence`])
//!
//! Each [`MatchCoordinator`] runs as one actor task. Commands and background
//! events share a single inbox, and all tasks started for a session are
//! released when the session is left.
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use match_coordinator::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!
//!     let host = MatchCoordinator::spawn(ChessRules::new(), store.clone(), CoordinatorConfig::default());
//!     let guest = MatchCoordinator::spawn(ChessRules::new(), store.clone(), CoordinatorConfig::default());
//!
//!     host.start_matchmaking(PlayerId::new("p1")).await?;
//!     guest.start_matchmaking(PlayerId::new("p2")).await?;
//!
//!     let mut state = host.subscribe_state();
//!     state.wait_for(|s| s.status == SessionStatus::Playing).await?;
//!     host.apply_move(MoveCandidate::notation("e4")).await?;
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod config;
pub mod error;
pub mod games;
pub mod matchmaking;
pub mod presence;
pub mod rules;
pub mod session;
pub mod store;
pub mod sync;
pub mod types;
pub mod utils;

pub use ai::AiMoveSelector;
pub use config::CoordinatorConfig;
pub use error::{PresenceError, RulesError, SessionError, StoreError};
pub use games::{GameKind, GameSession};
pub use matchmaking::{MatchAssignment, MatchmakingService};
pub use presence::{MemoryPresence, MemoryPresenceHub, PresenceChannel, PresenceEvent, PresenceTracker};
pub use rules::{ChessRules, LegalMove, MoveCandidate, Outcome, PieceKind, RulesEngine, TicTacToeRules};
pub use session::{CoordinatorState, MatchCoordinator, SessionSnapshot};
pub use store::{ChangeFeed, MatchStore, MemoryStore, StoreChange};
pub use sync::MoveSynchronizer;
pub use types::*;
pub use utils::{create_chess_coordinator, create_memory_backend, MemoryBackend};
