//! # Matchmaking
//!
//! Pairs a player with an open match or opens a new one. Joining is a
//! conditional write: the guest seat is claimed only if the row still has an
//! open seat when the store applies the update, and the affected-row count is
//! the sole evidence of success. A lost race is never an error; the player
//! simply hosts a fresh match instead.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::StoreError;
use crate::store::MatchStore;
use crate::types::{Color, MatchFilter, MatchId, MatchPatch, MatchRecord, MatchStatus, NewMatch, PlayerId};

/// Seat assigned to a player by [`MatchmakingService::find_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchAssignment {
    pub match_id: MatchId,
    /// `White` for the host, `Black` for the guest
    pub color: Color,
    /// The match row as it stood right after the assignment
    pub record: MatchRecord,
}

impl MatchAssignment {
    pub fn is_host(&self) -> bool {
        self.color == Color::White
    }
}

/// Finds or creates matches in a shared store.
#[derive(Clone)]
pub struct MatchmakingService {
    store: Arc<dyn MatchStore>,
    initial_encoding: String,
}

impl std::fmt::Debug for MatchmakingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchmakingService")
            .field("initial_encoding", &self.initial_encoding)
            .finish()
    }
}

impl MatchmakingService {
    /// Creates a service that opens new matches at `initial_encoding`.
    pub fn new(store: Arc<dyn MatchStore>, initial_encoding: impl Into<String>) -> Self {
        Self {
            store,
            initial_encoding: initial_encoding.into(),
        }
    }

    /// Joins an open match hosted by someone else, or hosts a new one.
    ///
    /// # Arguments
    ///
    /// * `player` - The player looking for an opponent
    ///
    /// # Returns
    ///
    /// The assigned match and color. Store failures are returned unchanged so
    /// the caller can stay in its waiting state and retry.
    pub async fn find_or_create(&self, player: &PlayerId) -> Result<MatchAssignment, StoreError> {
        if let Some(assignment) = self.try_join(player).await? {
            return Ok(assignment);
        }

        let record = self
            .store
            .insert_match(NewMatch {
                host_player_id: player.clone(),
                status: MatchStatus::Waiting,
                position_encoding: self.initial_encoding.clone(),
            })
            .await?;
        info!("🎲 {} is hosting match {} as white", player, record.id);

        Ok(MatchAssignment {
            match_id: record.id,
            color: Color::White,
            record,
        })
    }

    async fn try_join(&self, player: &PlayerId) -> Result<Option<MatchAssignment>, StoreError> {
        let Some(mut candidate) = self.store.find_one(&MatchFilter::joinable_by(player)).await? else {
            debug!("🔍 No open match for {}", player);
            return Ok(None);
        };

        let patch = MatchPatch::join(player.clone());
        let affected = self
            .store
            .update_where(candidate.id, &MatchFilter::open_seat(), patch.clone())
            .await?;
        if affected == 0 {
            debug!("🏁 {} lost the race for match {}; hosting instead", player, candidate.id);
            return Ok(None);
        }

        let last_move_at = candidate.last_move_at;
        patch.apply(&mut candidate, last_move_at);
        info!("🤝 {} joined match {} as black", player, candidate.id);
        Ok(Some(MatchAssignment {
            match_id: candidate.id,
            color: Color::Black,
            record: candidate,
        }))
    }
}
