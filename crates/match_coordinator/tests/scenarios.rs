//! Matchmaking races, the AI opponent and presence, end to end.

mod common;

use std::sync::Arc;

use common::{chess, eventually, fast_config, wait_for};
use match_coordinator::{
    ChessRules, Color, GameKind, GameSession, MatchCoordinator, MatchFilter, MatchPatch, MatchStatus,
    MatchStore, MatchmakingService, MemoryPresence, MemoryStore, MoveCandidate, NewMatch,
    PresenceChannel, PresenceError, PlayerId, RulesEngine, SessionStatus,
};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_guests_cannot_share_a_seat() {
    let store = Arc::new(MemoryStore::new());
    let initial = ChessRules::new().initial_encoding();
    let open = store
        .insert_match(NewMatch {
            host_player_id: PlayerId::new("host"),
            status: MatchStatus::Waiting,
            position_encoding: initial.clone(),
        })
        .await
        .unwrap();

    let service = MatchmakingService::new(store.clone(), initial);
    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.find_or_create(&PlayerId::new("p2")).await })
    };
    let second = tokio::spawn(async move { service.find_or_create(&PlayerId::new("p3")).await });
    let (a, b) = (first.await.unwrap(), second.await.unwrap());
    let (a, b) = (a.unwrap(), b.unwrap());

    let joined: Vec<_> = [&a, &b].into_iter().filter(|x| x.match_id == open.id).collect();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].color, Color::Black);

    let hosting: Vec<_> = [&a, &b].into_iter().filter(|x| x.match_id != open.id).collect();
    assert_eq!(hosting.len(), 1);
    assert_eq!(hosting[0].color, Color::White);

    let record = store.get_match(open.id).await.unwrap().unwrap();
    assert_eq!(record.status, MatchStatus::Playing);
    assert_eq!(record.guest_player_id, joined[0].record.guest_player_id);
    assert_eq!(store.match_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_racing_sessions_pair_off_exactly() {
    let store = Arc::new(MemoryStore::new());
    let sessions: Vec<_> = (0..8).map(|_| chess(&store)).collect();

    let starts = sessions
        .iter()
        .enumerate()
        .map(|(i, s)| s.start_matchmaking(PlayerId::new(format!("p{i}"))));
    for result in futures::future::join_all(starts).await {
        result.unwrap();
    }

    for session in &sessions {
        wait_for(session, |s| s.match_id.is_some()).await;
    }

    // Every match row has at most one guest, and each guest seat belongs to
    // exactly one black session.
    let mut black_by_match = std::collections::HashMap::new();
    for session in &sessions {
        let snapshot = session.snapshot();
        if snapshot.assigned_color == Some(Color::Black) {
            *black_by_match.entry(snapshot.match_id.unwrap()).or_insert(0) += 1;
        }
    }
    for (match_id, guests) in black_by_match {
        assert_eq!(guests, 1);
        let record = store.get_match(match_id).await.unwrap().unwrap();
        assert_eq!(record.status, MatchStatus::Playing);
        assert!(record.guest_player_id.is_some());
    }
}

#[tokio::test]
async fn ai_answers_the_first_move() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = chess(&store);

    coordinator.start_ai_game().await.unwrap();
    coordinator.apply_move(MoveCandidate::notation("e4")).await.unwrap();

    let snapshot = wait_for(&coordinator, |s| s.move_history.len() == 2).await;
    assert_eq!(snapshot.status, SessionStatus::Ai);
    assert_eq!(snapshot.move_history[0], "e4");

    let rules = ChessRules::new();
    let after_e4 = rules.play_notation(&rules.initial(), "e4").unwrap().0;
    let replies: Vec<String> = rules.legal_moves(&after_e4).into_iter().map(|m| m.notation).collect();
    assert!(replies.contains(&snapshot.move_history[1]));
    assert_eq!(store.match_count(), 0);
}

#[tokio::test]
async fn restart_from_local_after_ai_game() {
    let store = Arc::new(MemoryStore::new());
    let coordinator = chess(&store);
    coordinator.start_ai_game().await.unwrap();
    coordinator.apply_move(MoveCandidate::notation("e4")).await.unwrap();
    wait_for(&coordinator, |s| s.move_history.len() == 2).await;

    coordinator.start_local_game().await.unwrap();
    let snapshot = coordinator.snapshot();
    assert_eq!(snapshot.status, SessionStatus::Local);
    assert!(snapshot.move_history.is_empty());
    assert_eq!(snapshot.board_encoding, ChessRules::new().initial_encoding());
}

#[tokio::test]
async fn online_count_tracks_connected_clients() {
    let store = Arc::new(MemoryStore::new());
    let presence: Arc<dyn PresenceChannel> = Arc::new(MemoryPresence::new());

    let alice = MatchCoordinator::spawn(ChessRules::new(), store.clone(), fast_config())
        .with_presence(presence.clone(), Some(&PlayerId::new("alice")))
        .await
        .unwrap();
    let viewer = GameSession::spawn(GameKind::TicTacToe, store.clone(), fast_config())
        .with_presence(presence.clone(), None)
        .await
        .unwrap();

    assert_eq!(alice.presence_key().map(|k| k.0.as_str()), Some("alice"));
    let alice_ref = &alice;
    eventually(move || async move { alice_ref.online_count() == 2 }).await;
    assert_eq!(viewer.state().online_count, 2);
    assert_eq!(alice.state().online_count, 2);

    viewer.shutdown().await;
    eventually(move || async move { alice_ref.online_count() == 1 }).await;
}

#[tokio::test]
async fn closed_presence_channel_is_reported_to_the_caller() {
    let store = Arc::new(MemoryStore::new());
    let channel = Arc::new(MemoryPresence::new());
    channel.close();
    let presence: Arc<dyn PresenceChannel> = channel;

    let result = MatchCoordinator::spawn(ChessRules::new(), store, fast_config())
        .with_presence(presence, Some(&PlayerId::new("alice")))
        .await;
    assert_eq!(result.err(), Some(PresenceError::Closed));
}

#[tokio::test]
async fn host_sees_opponent_through_the_update_feed() {
    let store = Arc::new(MemoryStore::new());
    let host = chess(&store);
    host.start_matchmaking(PlayerId::new("p1")).await.unwrap();
    let hosting = wait_for(&host, |s| s.match_id.is_some()).await;
    let match_id = hosting.match_id.unwrap();
    assert_eq!(hosting.status, SessionStatus::Waiting);

    // A guest that joins directly through the store, without a coordinator.
    let affected = store
        .update_where(match_id, &MatchFilter::open_seat(), MatchPatch::join(PlayerId::new("p2")))
        .await
        .unwrap();
    assert_eq!(affected, 1);

    wait_for(&host, |s| s.status == SessionStatus::Playing).await;
    host.apply_move(MoveCandidate::notation("Nf3")).await.unwrap();
}
