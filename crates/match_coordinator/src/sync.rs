//! # Move Synchronization
//!
//! Reconciles a client's board replica with the canonical match record. Two
//! change streams feed it: move inserts (incremental) and match updates
//! (authoritative position). Delivery may be duplicated or out of order, so:
//!
//! - a move insert is applied only when it is the very next ply and the rules
//!   engine accepts it on a copy of the replica; anything else is dropped
//! - a match update whose encoding differs from the replica replaces the
//!   replica outright, and history is repaired as far as the engine allows
//! - a match update holding fewer plies than the replica is a late delivery
//!   and never rewinds it
//!
//! The follower task keeps a match's feed flowing into the session inbox and
//! resubscribes whenever the feed drops.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::rules::RulesEngine;
use crate::session::LocalSession;
use crate::store::{MatchStore, StoreChange};
use crate::types::{Color, MatchId, MatchRecord, MoveRecord};

const RESUBSCRIBE_DELAY: Duration = Duration::from_millis(250);

/// Result of feeding a move insert to the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveDisposition {
    /// Appended to the replica with this canonical notation
    Applied(String),
    /// Already part of the history (our own echo or a redelivery)
    Duplicate,
    /// Not the next ply, or rejected by the rules engine
    Discarded,
}

/// Result of feeding a match update to the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionDisposition {
    /// Replica already matched the record
    InSync,
    /// Record is older than the replica and was ignored
    Stale,
    /// Replica rebuilt from the record's encoding; history still consistent
    Resynced,
    /// Replica rebuilt, but the history could not be connected to it
    Detached,
    /// Record carried an encoding the engine cannot read
    Unreadable,
}

/// Applies remote changes to a [`LocalSession`] replica.
#[derive(Debug)]
pub struct MoveSynchronizer<R: RulesEngine> {
    rules: Arc<R>,
}

impl<R: RulesEngine> Clone for MoveSynchronizer<R> {
    fn clone(&self) -> Self {
        Self {
            rules: Arc::clone(&self.rules),
        }
    }
}

impl<R: RulesEngine> MoveSynchronizer<R> {
    pub fn new(rules: Arc<R>) -> Self {
        Self { rules }
    }

    /// Applies a move insert.
    pub fn on_move_inserted(
        &self,
        session: &mut LocalSession<R::Position>,
        record: &MoveRecord,
    ) -> MoveDisposition {
        let number = record.move_number as usize;
        if number <= session.history.len() {
            trace!("🔁 Move {} ({}) already applied", number, record.notation);
            return MoveDisposition::Duplicate;
        }
        if number != session.history.len() + 1 {
            trace!(
                "⏭️ Move {} ({}) arrived ahead of move {}; waiting for resync",
                number,
                record.notation,
                session.history.len() + 1
            );
            return MoveDisposition::Discarded;
        }

        match self.rules.play_notation(&session.board, &record.notation) {
            Ok((next, notation)) => {
                session.board = next;
                session.history.push(notation.clone());
                MoveDisposition::Applied(notation)
            }
            Err(e) => {
                trace!("🚫 Discarding remote move {}: {}", record.notation, e);
                MoveDisposition::Discarded
            }
        }
    }

    /// Applies a match update's position.
    pub fn on_match_updated(
        &self,
        session: &mut LocalSession<R::Position>,
        record: &MatchRecord,
    ) -> PositionDisposition {
        let target = &record.position_encoding;
        if *target == self.rules.encode(&session.board) {
            return PositionDisposition::InSync;
        }
        if (record.move_count as usize) < session.history.len() {
            trace!(
                "⏪ Ignoring match {} at ply {}; replica is at ply {}",
                record.id,
                record.move_count,
                session.history.len()
            );
            return PositionDisposition::Stale;
        }

        let position = match self.rules.decode(target) {
            Ok(position) => position,
            Err(e) => {
                warn!("⚠️ Match {} carries an unreadable position: {}", record.id, e);
                return PositionDisposition::Unreadable;
            }
        };

        // History can only be extended when it still describes the board.
        let history_fits =
            Color::after_plies(session.history.len()) == self.rules.side_to_move(&session.board);
        let connecting = history_fits
            .then(|| self.rules.connecting_move(&session.board, target))
            .flatten();

        let disposition = if let Some(notation) = connecting {
            session.history.push(notation);
            PositionDisposition::Resynced
        } else {
            debug!(
                "🧭 Resync of match {} is not one move ahead; keeping {} known moves",
                record.id,
                session.history.len()
            );
            PositionDisposition::Detached
        };

        session.board = position;
        debug!("🔄 Resynced match {} to {}", record.id, target);
        disposition
    }

    /// Replaces the history with the store's move log if replaying that log
    /// from the initial position reproduces the replica exactly.
    pub fn rebuild_history(&self, session: &mut LocalSession<R::Position>, moves: &[MoveRecord]) -> bool {
        let mut position = self.rules.initial();
        let mut history = Vec::with_capacity(moves.len());
        for record in moves {
            match self.rules.play_notation(&position, &record.notation) {
                Ok((next, notation)) => {
                    position = next;
                    history.push(notation);
                }
                Err(e) => {
                    trace!("🚫 Move log does not replay at {}: {}", record.notation, e);
                    return false;
                }
            }
        }

        if self.rules.encode(&position) != self.rules.encode(&session.board) {
            return false;
        }
        session.history = history;
        true
    }
}

/// Forwards the change feed of `match_id` into `sink` until the sink closes.
///
/// Every (re)subscription is followed by a read of the current match row, so
/// changes missed while disconnected are recovered by a resync.
pub async fn follow_match<T, W>(
    store: Arc<dyn MatchStore>,
    match_id: MatchId,
    sink: mpsc::Sender<T>,
    wrap: W,
) where
    T: Send + 'static,
    W: Fn(StoreChange) -> T + Send + Sync + 'static,
{
    loop {
        let mut feed = match store.subscribe(match_id).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!("📡 Subscribing to match {} failed: {} - retrying", match_id, e);
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                continue;
            }
        };

        match store.get_match(match_id).await {
            Ok(Some(current)) => {
                if sink.send(wrap(StoreChange::MatchUpdated(current))).await.is_err() {
                    return;
                }
            }
            Ok(None) => warn!("📡 Match {} vanished from the store", match_id),
            Err(e) => warn!("📡 Reading match {} failed: {}", match_id, e),
        }

        while let Some(change) = feed.recv().await {
            if sink.send(wrap(change)).await.is_err() {
                return;
            }
        }

        warn!("📡 Change feed for match {} dropped - resubscribing", match_id);
        tokio::time::sleep(RESUBSCRIBE_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::ChessRules;
    use crate::store::MemoryStore;
    use crate::error::StoreError;
    use crate::types::{MatchFilter, MatchPatch, MatchStatus, NewMatch, NewMove, PlayerId, SessionStatus};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (MoveSynchronizer<ChessRules>, Arc<ChessRules>, LocalSession<shakmaty::Chess>) {
        let rules = Arc::new(ChessRules::new());
        let session = LocalSession::entered(SessionStatus::Playing, rules.initial());
        (MoveSynchronizer::new(Arc::clone(&rules)), rules, session)
    }

    fn move_record(number: u32, notation: &str) -> MoveRecord {
        MoveRecord {
            match_id: MatchId::new(),
            notation: notation.to_string(),
            move_number: number,
            created_at: Utc::now(),
        }
    }

    fn match_record(encoding: String, move_count: u32) -> MatchRecord {
        MatchRecord {
            id: MatchId::new(),
            host_player_id: PlayerId::new("p1"),
            guest_player_id: Some(PlayerId::new("p2")),
            status: MatchStatus::Playing,
            position_encoding: encoding,
            move_count,
            last_move_at: Utc::now(),
        }
    }

    fn encoding_after(rules: &ChessRules, moves: &[&str]) -> String {
        let position = moves.iter().fold(rules.initial(), |pos, mv| {
            rules.play_notation(&pos, mv).unwrap().0
        });
        rules.encode(&position)
    }

    #[test]
    fn test_duplicate_insert_is_idempotent() {
        let (sync, rules, mut session) = setup();
        let e4 = move_record(1, "e4");

        assert_eq!(sync.on_move_inserted(&mut session, &e4), MoveDisposition::Applied("e4".into()));
        let once = rules.encode(&session.board);
        assert_eq!(sync.on_move_inserted(&mut session, &e4), MoveDisposition::Duplicate);

        assert_eq!(rules.encode(&session.board), once);
        assert_eq!(session.history, vec!["e4"]);
    }

    #[test]
    fn test_out_of_order_insert_is_discarded() {
        let (sync, rules, mut session) = setup();

        // Nf3 is legal from the start, but it is ply 3, not ply 1.
        assert_eq!(
            sync.on_move_inserted(&mut session, &move_record(3, "Nf3")),
            MoveDisposition::Discarded
        );
        assert_eq!(
            sync.on_move_inserted(&mut session, &move_record(1, "e5")),
            MoveDisposition::Discarded
        );
        assert_eq!(rules.encode(&session.board), rules.initial_encoding());
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_resync_converges_regardless_of_delivery_order() {
        let (sync, rules, _) = setup();
        let canonical = encoding_after(&rules, &["e4", "e5"]);
        let stale = move_record(1, "e4");

        let (_, _, mut update_first) = setup();
        sync.on_match_updated(&mut update_first, &match_record(canonical.clone(), 2));
        sync.on_move_inserted(&mut update_first, &stale);

        let (_, _, mut insert_first) = setup();
        sync.on_move_inserted(&mut insert_first, &stale);
        sync.on_match_updated(&mut insert_first, &match_record(canonical.clone(), 2));

        assert_eq!(rules.encode(&update_first.board), canonical);
        assert_eq!(rules.encode(&insert_first.board), canonical);
    }

    #[test]
    fn test_resync_one_move_ahead_extends_history() {
        let (sync, rules, mut session) = setup();
        sync.on_move_inserted(&mut session, &move_record(1, "e4"));

        let target = encoding_after(&rules, &["e4", "c5"]);
        assert_eq!(
            sync.on_match_updated(&mut session, &match_record(target.clone(), 2)),
            PositionDisposition::Resynced
        );
        assert_eq!(session.history, vec!["e4", "c5"]);
        assert_eq!(
            sync.on_match_updated(&mut session, &match_record(target, 2)),
            PositionDisposition::InSync
        );
    }

    #[test]
    fn test_resync_far_ahead_keeps_known_history() {
        let (sync, rules, mut session) = setup();
        let target = encoding_after(&rules, &["d4", "d5", "c4"]);

        assert_eq!(
            sync.on_match_updated(&mut session, &match_record(target.clone(), 3)),
            PositionDisposition::Detached
        );
        assert_eq!(rules.encode(&session.board), target);
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_detached_history_is_not_extended() {
        let (sync, rules, mut session) = setup();
        let far = encoding_after(&rules, &["d4", "d5", "c4"]);
        sync.on_match_updated(&mut session, &match_record(far, 3));

        // One legal move ahead of the board, but the empty history no longer
        // describes it, so appending e6 would make it claim ply 1.
        let next = encoding_after(&rules, &["d4", "d5", "c4", "e6"]);
        assert_eq!(
            sync.on_match_updated(&mut session, &match_record(next.clone(), 4)),
            PositionDisposition::Detached
        );
        assert_eq!(rules.encode(&session.board), next);
        assert!(session.history.is_empty());
    }

    #[test]
    fn test_move_log_repairs_detached_history() {
        let (sync, rules, mut session) = setup();
        let target = encoding_after(&rules, &["d4", "d5", "c4"]);
        sync.on_match_updated(&mut session, &match_record(target, 3));

        let log = vec![move_record(1, "d4"), move_record(2, "d5")];
        assert!(!sync.rebuild_history(&mut session, &log));
        assert!(session.history.is_empty());

        let log = vec![move_record(1, "d4"), move_record(2, "d5"), move_record(3, "c4")];
        assert!(sync.rebuild_history(&mut session, &log));
        assert_eq!(session.history, vec!["d4", "d5", "c4"]);
    }

    #[test]
    fn test_older_position_does_not_rewind_replica() {
        let (sync, rules, mut session) = setup();
        sync.on_move_inserted(&mut session, &move_record(1, "e4"));
        sync.on_move_inserted(&mut session, &move_record(2, "e5"));
        let current = rules.encode(&session.board);

        let late = match_record(encoding_after(&rules, &["e4"]), 1);
        assert_eq!(sync.on_match_updated(&mut session, &late), PositionDisposition::Stale);
        let initial = match_record(rules.initial_encoding(), 0);
        assert_eq!(sync.on_match_updated(&mut session, &initial), PositionDisposition::Stale);

        assert_eq!(rules.encode(&session.board), current);
        assert_eq!(session.history, vec!["e4", "e5"]);
    }

    #[test]
    fn test_unreadable_encoding_leaves_replica_alone() {
        let (sync, rules, mut session) = setup();
        assert_eq!(
            sync.on_match_updated(&mut session, &match_record("garbage".to_string(), 0)),
            PositionDisposition::Unreadable
        );
        assert_eq!(rules.encode(&session.board), rules.initial_encoding());
    }

    #[tokio::test]
    async fn test_follower_replays_current_row_then_live_changes() {
        let store = Arc::new(MemoryStore::new());
        let record = store
            .insert_match(NewMatch {
                host_player_id: PlayerId::new("p1"),
                status: MatchStatus::Waiting,
                position_encoding: "start".to_string(),
            })
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let follower = tokio::spawn(follow_match(store.clone(), record.id, tx, |change| change));

        match rx.recv().await.unwrap() {
            StoreChange::MatchUpdated(current) => assert_eq!(current.status, MatchStatus::Waiting),
            other => panic!("unexpected change: {other:?}"),
        }

        store
            .update_where(record.id, &MatchFilter::open_seat(), MatchPatch::join(PlayerId::new("p2")))
            .await
            .unwrap();
        match rx.recv().await.unwrap() {
            StoreChange::MatchUpdated(current) => assert_eq!(current.status, MatchStatus::Playing),
            other => panic!("unexpected change: {other:?}"),
        }

        drop(rx);
        follower.abort();
    }

    /// Store whose first change feed closes after delivering one change.
    struct FlakyFeeds {
        inner: Arc<MemoryStore>,
        subscriptions: AtomicUsize,
    }

    #[async_trait]
    impl MatchStore for FlakyFeeds {
        async fn find_one(&self, filter: &MatchFilter) -> Result<Option<MatchRecord>, StoreError> {
            self.inner.find_one(filter).await
        }

        async fn get_match(&self, id: MatchId) -> Result<Option<MatchRecord>, StoreError> {
            self.inner.get_match(id).await
        }

        async fn insert_match(&self, new_match: NewMatch) -> Result<MatchRecord, StoreError> {
            self.inner.insert_match(new_match).await
        }

        async fn update_where(
            &self,
            id: MatchId,
            filter: &MatchFilter,
            patch: MatchPatch,
        ) -> Result<u64, StoreError> {
            self.inner.update_where(id, filter, patch).await
        }

        async fn insert_move(&self, new_move: NewMove) -> Result<MoveRecord, StoreError> {
            self.inner.insert_move(new_move).await
        }

        async fn moves(&self, id: MatchId) -> Result<Vec<MoveRecord>, StoreError> {
            self.inner.moves(id).await
        }

        async fn subscribe(&self, id: MatchId) -> Result<crate::store::ChangeFeed, StoreError> {
            let mut feed = self.inner.subscribe(id).await?;
            if self.subscriptions.fetch_add(1, Ordering::SeqCst) > 0 {
                return Ok(feed);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(async move {
                if let Some(change) = feed.recv().await {
                    let _ = tx.send(change);
                }
            });
            Ok(rx)
        }
    }

    async fn next_update(rx: &mut mpsc::Receiver<StoreChange>) -> MatchRecord {
        match tokio::time::timeout(Duration::from_secs(5), rx.recv()).await {
            Ok(Some(StoreChange::MatchUpdated(record))) => record,
            other => panic!("expected a match update, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_follower_resubscribes_and_recovers_missed_changes() {
        let inner = Arc::new(MemoryStore::new());
        let store = Arc::new(FlakyFeeds {
            inner: inner.clone(),
            subscriptions: AtomicUsize::new(0),
        });
        let record = inner
            .insert_match(NewMatch {
                host_player_id: PlayerId::new("p1"),
                status: MatchStatus::Waiting,
                position_encoding: "start".to_string(),
            })
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        let follower = tokio::spawn(follow_match(store.clone(), record.id, tx, |change| change));
        assert_eq!(next_update(&mut rx).await.status, MatchStatus::Waiting);

        inner
            .update_where(record.id, &MatchFilter::open_seat(), MatchPatch::join(PlayerId::new("p2")))
            .await
            .unwrap();
        assert_eq!(next_update(&mut rx).await.status, MatchStatus::Playing);

        // The first feed is gone; this change is never delivered live.
        inner
            .update_where(record.id, &MatchFilter::behind(1), MatchPatch::position("after-e4".to_string(), 1, None))
            .await
            .unwrap();
        let repaired = next_update(&mut rx).await;
        assert_eq!(repaired.position_encoding, "after-e4");
        assert_eq!(repaired.move_count, 1);

        // Wait until the follower actually holds the second feed.
        while store.subscriptions.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        inner
            .update_where(record.id, &MatchFilter::behind(2), MatchPatch::position("after-e5".to_string(), 2, None))
            .await
            .unwrap();
        assert_eq!(next_update(&mut rx).await.move_count, 2);
        assert_eq!(store.subscriptions.load(Ordering::SeqCst), 2);

        drop(rx);
        follower.abort();
    }
}
