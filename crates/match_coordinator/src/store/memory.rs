//! In-memory shared store.
//!
//! Rows live in `DashMap`s; a conditional update holds the row's shard lock
//! while it checks the predicate, applies the patch and notifies watchers.
//! Two writers can never both see an open seat and both claim it, and
//! watchers see updates to a row in the order they were applied.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{ChangeFeed, MatchStore, StoreChange};
use crate::error::StoreError;
use crate::types::{MatchFilter, MatchId, MatchPatch, MatchRecord, MoveRecord, NewMatch, NewMove};

/// In-memory [`MatchStore`] for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    matches: DashMap<MatchId, MatchRecord>,
    moves: DashMap<MatchId, Vec<MoveRecord>>,
    watchers: DashMap<MatchId, Vec<mpsc::UnboundedSender<StoreChange>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent write fail with [`StoreError::Unavailable`]
    /// until switched off again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    /// Number of live change subscriptions for a match.
    pub fn watcher_count(&self, id: MatchId) -> usize {
        self.watchers
            .get(&id)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn publish(&self, id: MatchId, change: StoreChange) {
        if let Some(mut senders) = self.watchers.get_mut(&id) {
            senders.retain(|tx| tx.send(change.clone()).is_ok());
            trace!("📡 Published change for match {} to {} watchers", id, senders.len());
        }
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn find_one(&self, filter: &MatchFilter) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self
            .matches
            .iter()
            .filter(|row| filter.matches(row.value()))
            .min_by_key(|row| row.last_move_at)
            .map(|row| row.value().clone()))
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
        Ok(self.matches.get(&id).map(|row| row.value().clone()))
    }

    async fn insert_match(&self, new_match: NewMatch) -> Result<MatchRecord, StoreError> {
        self.check_writable()?;
        let record = MatchRecord {
            id: MatchId::new(),
            host_player_id: new_match.host_player_id,
            guest_player_id: None,
            status: new_match.status,
            position_encoding: new_match.position_encoding,
            move_count: 0,
            last_move_at: Utc::now(),
        };
        self.matches.insert(record.id, record.clone());
        debug!("🆕 Inserted match {} for host {}", record.id, record.host_player_id);
        Ok(record)
    }

    async fn update_where(
        &self,
        id: MatchId,
        filter: &MatchFilter,
        patch: MatchPatch,
    ) -> Result<u64, StoreError> {
        self.check_writable()?;
        let Some(mut row) = self.matches.get_mut(&id) else {
            return Ok(0);
        };
        if !filter.matches(row.value()) {
            trace!("⛔ Conditional update of match {} did not match", id);
            return Ok(0);
        }
        patch.apply(row.value_mut(), Utc::now());
        self.publish(id, StoreChange::MatchUpdated(row.value().clone()));
        Ok(1)
    }

    async fn insert_move(&self, new_move: NewMove) -> Result<MoveRecord, StoreError> {
        self.check_writable()?;
        if !self.matches.contains_key(&new_move.match_id) {
            return Err(StoreError::NotFound(new_move.match_id.to_string()));
        }
        let record = MoveRecord {
            match_id: new_move.match_id,
            notation: new_move.notation,
            move_number: new_move.move_number,
            created_at: Utc::now(),
        };
        let mut log = self.moves.entry(record.match_id).or_default();
        log.push(record.clone());
        log.sort_by_key(|m| m.move_number);
        self.publish(record.match_id, StoreChange::MoveInserted(record.clone()));
        Ok(record)
    }

    async fn moves(&self, id: MatchId) -> Result<Vec<MoveRecord>, StoreError> {
        Ok(self.moves.get(&id).map(|log| log.value().clone()).unwrap_or_default())
    }

    async fn subscribe(&self, id: MatchId) -> Result<ChangeFeed, StoreError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.entry(id).or_default().push(tx);
        debug!("👂 New change subscription for match {}", id);
        Ok(rx)
    }
}
