#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use match_coordinator::{
    ChessRules, CoordinatorConfig, MatchCoordinator, MatchId, MemoryStore, PlayerId, RulesEngine,
    SessionSnapshot, SessionStatus,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig::default().with_ai_think_delay(Duration::from_millis(10))
}

pub fn chess(store: &Arc<MemoryStore>) -> MatchCoordinator<ChessRules> {
    MatchCoordinator::spawn(ChessRules::new(), store.clone(), fast_config())
}

/// Waits until the coordinator publishes a state matching `predicate`.
pub async fn wait_for<R: RulesEngine>(
    coordinator: &MatchCoordinator<R>,
    predicate: impl FnMut(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut rx = coordinator.subscribe_state();
    let snapshot = tokio::time::timeout(TIMEOUT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session state")
        .expect("session stopped")
        .clone();
    snapshot
}

/// Polls `check` until it returns true.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    tokio::time::timeout(TIMEOUT, async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never became true");
}

/// Pairs two fresh chess sessions: `p1` hosts as white, `p2` joins as black.
pub async fn paired_chess(
    store: &Arc<MemoryStore>,
) -> (MatchCoordinator<ChessRules>, MatchCoordinator<ChessRules>, MatchId) {
    let host = chess(store);
    host.start_matchmaking(PlayerId::new("p1")).await.unwrap();
    let hosting = wait_for(&host, |s| s.match_id.is_some()).await;

    let guest = chess(store);
    guest.start_matchmaking(PlayerId::new("p2")).await.unwrap();
    wait_for(&guest, |s| s.status == SessionStatus::Playing).await;
    wait_for(&host, |s| s.status == SessionStatus::Playing).await;

    let match_id = hosting.match_id.unwrap();
    (host, guest, match_id)
}
