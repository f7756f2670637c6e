//! Factory functions for common coordinator setups.

use std::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::presence::MemoryPresenceHub;
use crate::rules::ChessRules;
use crate::session::MatchCoordinator;
use crate::store::MemoryStore;

/// Shared in-process backends: one store and a hub of named presence channels
/// that any number of coordinators can be attached to.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    pub store: Arc<MemoryStore>,
    pub presence: Arc<MemoryPresenceHub>,
}

/// Creates a fresh in-memory store and presence hub.
pub fn create_memory_backend() -> MemoryBackend {
    MemoryBackend::default()
}

/// Creates a chess coordinator on `backend` with default configuration.
///
/// # Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use match_coordinator::{create_chess_coordinator, create_memory_backend, MoveCandidate};
///
/// let backend = create_memory_backend();
/// let coordinator = create_chess_coordinator(&backend);
/// coordinator.apply_move(MoveCandidate::notation("e4")).await.unwrap();
/// # }
/// ```
pub fn create_chess_coordinator(backend: &MemoryBackend) -> MatchCoordinator<ChessRules> {
    MatchCoordinator::spawn(
        ChessRules::new(),
        backend.store.clone(),
        CoordinatorConfig::default(),
    )
}
