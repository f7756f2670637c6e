//! # Shared Store Seam
//!
//! Durable match and move records live in an external store that supports
//! conditional (predicate-guarded) updates and per-match change feeds. The
//! coordinator only depends on the [`MatchStore`] trait; [`MemoryStore`] is
//! the in-process implementation used by tests and the simulation host.
//!
//! ## Consistency Model
//!
//! - `update_where` is the only write competing clients race on. It must
//!   evaluate the predicate and apply the patch atomically and report how many
//!   rows it touched.
//! - Change feeds deliver inserts and updates at least once, in no guaranteed
//!   order relative to each other.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::types::{MatchFilter, MatchId, MatchPatch, MatchRecord, MoveRecord, NewMatch, NewMove};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// A change notification scoped to one match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// A move row was appended
    MoveInserted(MoveRecord),
    /// The match row was updated; carries the row after the update
    MatchUpdated(MatchRecord),
}

/// Receiving half of a change subscription.
///
/// Dropping it unsubscribes; the store prunes the dead sender on its next
/// publish.
pub type ChangeFeed = mpsc::UnboundedReceiver<StoreChange>;

/// Durable record storage with optimistic concurrency.
#[async_trait]
pub trait MatchStore: Send + Sync + 'static {
    /// Returns one match satisfying `filter`, if any.
    async fn find_one(&self, filter: &MatchFilter) -> Result<Option<MatchRecord>, StoreError>;

    async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError>;

    /// Inserts a new match and returns the stored row.
    async fn insert_match(&self, new_match: NewMatch) -> Result<MatchRecord, StoreError>;

    /// Applies `patch` to match `id` only if the row still satisfies `filter`
    /// at write time. Returns the number of rows affected (0 or 1).
    async fn update_where(
        &self,
        id: MatchId,
        filter: &MatchFilter,
        patch: MatchPatch,
    ) -> Result<u64, StoreError>;

    /// Appends a move row.
    async fn insert_move(&self, new_move: NewMove) -> Result<MoveRecord, StoreError>;

    /// Moves recorded for a match, ordered by move number.
    async fn moves(&self, id: MatchId) -> Result<Vec<MoveRecord>, StoreError>;

    /// Opens a change feed for one match.
    async fn subscribe(&self, id: MatchId) -> Result<ChangeFeed, StoreError>;
}
