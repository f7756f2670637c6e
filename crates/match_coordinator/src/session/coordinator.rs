//! # Match Coordinator
//!
//! The session state machine. Each coordinator is a single actor task that
//! owns the [`LocalSession`] and consumes one bounded inbox carrying both
//! caller commands and the events produced by its own background work
//! (matchmaking results, change-feed notifications, move logs and AI timers).
//!
//! ## Session Generations
//!
//! Every entry into a fresh session bumps a generation counter and releases
//! the previous [`SessionScope`]. Background tasks stamp their events with the
//! generation that started them, so anything still in flight from an
//! abandoned session is dropped on arrival instead of leaking into the new
//! one.
//!
//! ## Remote Writes
//!
//! Moves made while a match is assigned are written to the store in the
//! background. A failed write is logged and never rolls back the local move.
//! Position writes only land on a row that holds fewer plies than the write,
//! so a delayed write cannot rewind the match.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use super::scope::SessionScope;
use super::state::{CoordinatorState, LocalSession, Operation, SessionSnapshot};
use crate::ai::AiMoveSelector;
use crate::config::CoordinatorConfig;
use crate::error::{PresenceError, SessionError, StoreError};
use crate::matchmaking::{MatchAssignment, MatchmakingService};
use crate::presence::{PresenceChannel, PresenceTracker};
use crate::error::RulesError;
use crate::rules::{LegalMove, MoveCandidate, Outcome, RulesEngine};
use crate::store::{MatchStore, StoreChange};
use crate::sync::{follow_match, MoveDisposition, MoveSynchronizer, PositionDisposition};
use crate::types::{
    Color, MatchFilter, MatchId, MatchPatch, MatchStatus, MoveRecord, NewMove, PlayerId, PresenceKey,
    SessionStatus,
};

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

// ============================================================================
// Inbox Messages
// ============================================================================

enum Command {
    StartLocalGame(Reply<()>),
    StartAiGame(Reply<()>),
    StartMatchmaking { player: PlayerId, reply: Reply<()> },
    ApplyMove { candidate: MoveCandidate, reply: Reply<String> },
    CancelOrExit(Reply<()>),
    Shutdown,
}

enum SessionEvent {
    Matchmaking(Result<MatchAssignment, StoreError>),
    Remote(StoreChange),
    MoveLog(Vec<MoveRecord>),
    AiMoveDue,
}

enum Inbound {
    Command(Command),
    Event { generation: u64, event: SessionEvent },
}

// ============================================================================
// Actor
// ============================================================================

struct SessionActor<R: RulesEngine> {
    rules: Arc<R>,
    store: Arc<dyn MatchStore>,
    matchmaking: MatchmakingService,
    sync: MoveSynchronizer<R>,
    ai: AiMoveSelector,
    config: CoordinatorConfig,
    session: LocalSession<R::Position>,
    generation: u64,
    matchmaking_in_flight: bool,
    history_detached: bool,
    scope: SessionScope,
    inbox: mpsc::Sender<Inbound>,
    state: watch::Sender<SessionSnapshot>,
}

impl<R: RulesEngine> SessionActor<R> {
    async fn run(mut self, mut inbox: mpsc::Receiver<Inbound>) {
        debug!("🎮 {} session actor started", self.rules.name());

        while let Some(message) = inbox.recv().await {
            match message {
                Inbound::Command(Command::Shutdown) => break,
                Inbound::Command(command) => self.handle_command(command),
                Inbound::Event { generation, event } => {
                    if generation != self.generation {
                        trace!(
                            "🗑️ Dropping event from session generation {} (current {})",
                            generation,
                            self.generation
                        );
                        continue;
                    }
                    self.handle_event(event);
                    self.publish();
                }
            }
        }

        let released = self.scope.release();
        debug!("🛑 {} session actor stopped ({} tasks released)", self.rules.name(), released);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartLocalGame(reply) => {
                self.enter(SessionStatus::Local);
                self.respond(reply, Ok(()));
            }
            Command::StartAiGame(reply) => {
                let result = self.start_ai_game();
                self.respond(reply, result);
            }
            Command::StartMatchmaking { player, reply } => {
                let result = self.start_matchmaking(player);
                self.respond(reply, result);
            }
            Command::ApplyMove { candidate, reply } => {
                let result = self.apply_move(candidate);
                self.respond(reply, result);
            }
            Command::CancelOrExit(reply) => {
                let result = self.cancel_or_exit();
                self.respond(reply, result);
            }
            Command::Shutdown => {}
        }
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Matchmaking(result) => self.on_matchmaking(result),
            SessionEvent::Remote(change) => self.on_remote(change),
            SessionEvent::MoveLog(moves) => self.on_move_log(moves),
            SessionEvent::AiMoveDue => self.play_ai_move(),
        }
    }

    /// Publishes the new state before answering, so a caller that awaited the
    /// reply always observes its own change.
    fn respond<T>(&mut self, reply: Reply<T>, result: Result<T, SessionError>) {
        if let Err(e) = &result {
            debug!("🙅 Rejected in {}: {}", self.session.status, e);
        }
        self.publish();
        let _ = reply.send(result);
    }

    fn publish(&self) {
        let next = self.session.snapshot(self.rules.as_ref());
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    // ------------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------------

    /// Starts a fresh session in `status`, abandoning all work of the old one.
    fn enter(&mut self, status: SessionStatus) {
        self.scope.release();
        self.generation += 1;
        self.matchmaking_in_flight = false;
        self.history_detached = false;

        let from = self.session.status;
        self.session = LocalSession::entered(status, self.rules.initial());
        info!("🔀 Session {} -> {} (generation {})", from, status, self.generation);
    }

    /// Changes status within the current session.
    fn transition(&mut self, status: SessionStatus) {
        let from = self.session.status;
        self.session.status = status;
        info!("🔀 Session {} -> {}", from, status);
    }

    fn finish(&mut self) {
        self.transition(SessionStatus::Ended);
        if let (Some(match_id), Some(outcome)) = (self.session.match_id, self.outcome()) {
            info!("🏁 Match {} ended: {:?}", match_id, outcome);
        }
    }

    fn outcome(&self) -> Option<Outcome> {
        self.rules.outcome_after(&self.session.board, &self.session.history)
    }

    fn ai_color(&self) -> Color {
        self.session.assigned_color.unwrap_or(Color::White).opposite()
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    fn start_ai_game(&mut self) -> Result<(), SessionError> {
        Operation::StartAiGame.check(self.session.status)?;
        self.enter(SessionStatus::Ai);
        self.session.assigned_color = Some(Color::White);
        Ok(())
    }

    fn start_matchmaking(&mut self, player: PlayerId) -> Result<(), SessionError> {
        let from = self.session.status;
        Operation::StartMatchmaking.check(from)?;

        if from == SessionStatus::Waiting {
            if self.matchmaking_in_flight || self.session.match_id.is_some() {
                return Err(SessionError::illegal_transition(
                    from,
                    Operation::StartMatchmaking.describe(),
                ));
            }
            debug!("🔁 Retrying matchmaking for {}", player);
        } else {
            self.enter(SessionStatus::Waiting);
        }

        self.matchmaking_in_flight = true;
        let service = self.matchmaking.clone();
        let sink = self.inbox.clone();
        let generation = self.generation;
        self.scope.spawn(async move {
            let result = service.find_or_create(&player).await;
            let event = SessionEvent::Matchmaking(result);
            let _ = sink.send(Inbound::Event { generation, event }).await;
        });
        Ok(())
    }

    fn cancel_or_exit(&mut self) -> Result<(), SessionError> {
        Operation::CancelOrExit.check(self.session.status)?;
        let abandoned = match (self.session.status, self.session.match_id) {
            (SessionStatus::Waiting, Some(match_id)) => Some(match_id),
            _ => None,
        };

        self.enter(SessionStatus::Local);
        if let Some(match_id) = abandoned {
            self.close_open_match(match_id);
        }
        Ok(())
    }

    fn apply_move(&mut self, candidate: MoveCandidate) -> Result<String, SessionError> {
        let status = self.session.status;
        Operation::ApplyMove.check(status)?;
        if self.outcome().is_some() {
            return Err(RulesError::GameOver.into());
        }

        let side = self.rules.side_to_move(&self.session.board);
        let my_turn = match status {
            SessionStatus::Playing => self.session.assigned_color == Some(side),
            SessionStatus::Ai => side != self.ai_color(),
            _ => true,
        };
        if !my_turn {
            return Err(SessionError::NotYourTurn);
        }

        let (next, notation) = self.rules.play(&self.session.board, &candidate)?;
        let move_number = self.session.next_move_number();
        self.session.board = next;
        self.session.history.push(notation.clone());
        debug!("♟️ Played {} (ply {})", notation, move_number);

        let game_over = self.outcome().is_some();
        if let Some(match_id) = self.session.match_id {
            self.persist_move(match_id, notation.clone(), move_number, game_over);
        }

        match status {
            SessionStatus::Playing if game_over => self.finish(),
            SessionStatus::Ai if !game_over => self.schedule_ai_move(),
            _ => {}
        }
        Ok(notation)
    }

    // ------------------------------------------------------------------------
    // Background work
    // ------------------------------------------------------------------------

    fn persist_move(&mut self, match_id: MatchId, notation: String, move_number: u32, game_over: bool) {
        let store = Arc::clone(&self.store);
        let new_move = NewMove {
            match_id,
            notation,
            move_number,
        };
        let patch = MatchPatch::position(
            self.rules.encode(&self.session.board),
            move_number,
            game_over.then_some(MatchStatus::Ended),
        );

        self.scope.spawn(async move {
            if let Err(e) = store.insert_move(new_move).await {
                warn!("💾 Move {} of match {} was not recorded: {}", move_number, match_id, e);
            }
            match store.update_where(match_id, &MatchFilter::behind(move_number), patch).await {
                Ok(0) => warn!(
                    "💾 Position write for move {} of match {} lost to a newer one",
                    move_number, match_id
                ),
                Ok(_) => {}
                Err(e) => warn!("💾 Position of match {} was not published: {}", match_id, e),
            }
        });
    }

    /// Ends a match this client opened but nobody joined. Runs in the new
    /// session's scope; a guest that already claimed the seat keeps the row.
    fn close_open_match(&mut self, match_id: MatchId) {
        let store = Arc::clone(&self.store);
        self.scope.spawn(async move {
            match store
                .update_where(match_id, &MatchFilter::open_seat(), MatchPatch::close())
                .await
            {
                Ok(0) => debug!("🚪 Match {} was no longer open", match_id),
                Ok(_) => info!("🚪 Closed abandoned match {}", match_id),
                Err(e) => warn!("🚪 Could not close abandoned match {}: {}", match_id, e),
            }
        });
    }

    fn follow(&mut self, match_id: MatchId) {
        let generation = self.generation;
        self.scope.spawn(follow_match(
            Arc::clone(&self.store),
            match_id,
            self.inbox.clone(),
            move |change| Inbound::Event {
                generation,
                event: SessionEvent::Remote(change),
            },
        ));
    }

    fn request_move_log(&mut self, match_id: MatchId) {
        let store = Arc::clone(&self.store);
        let sink = self.inbox.clone();
        let generation = self.generation;
        self.scope.spawn(async move {
            match store.moves(match_id).await {
                Ok(moves) => {
                    let event = SessionEvent::MoveLog(moves);
                    let _ = sink.send(Inbound::Event { generation, event }).await;
                }
                Err(e) => warn!("📜 Move log of match {} unavailable: {}", match_id, e),
            }
        });
    }

    fn schedule_ai_move(&mut self) {
        if self.rules.side_to_move(&self.session.board) != self.ai_color() {
            return;
        }

        let delay = self.config.ai_think_delay();
        let sink = self.inbox.clone();
        let generation = self.generation;
        self.scope.spawn(async move {
            tokio::time::sleep(delay).await;
            let event = SessionEvent::AiMoveDue;
            let _ = sink.send(Inbound::Event { generation, event }).await;
        });
        trace!("🤔 AI reply due in {:?}", delay);
    }

    // ------------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------------

    fn on_matchmaking(&mut self, result: Result<MatchAssignment, StoreError>) {
        self.matchmaking_in_flight = false;
        let assignment = match result {
            Ok(assignment) => assignment,
            Err(e) => {
                warn!("🎲 Matchmaking failed, still waiting: {}", e);
                return;
            }
        };

        let encoding = &assignment.record.position_encoding;
        match self.rules.decode(encoding) {
            Ok(board) => self.session.board = board,
            Err(e) => warn!("⚠️ Match {} starts from an unreadable position: {}", assignment.match_id, e),
        }
        self.session.history.clear();
        self.session.match_id = Some(assignment.match_id);
        self.session.assigned_color = Some(assignment.color);
        info!(
            "🎲 {} match {} as {}",
            if assignment.is_host() { "Hosting" } else { "Joined" },
            assignment.match_id,
            assignment.color
        );

        if assignment.record.status == MatchStatus::Playing {
            self.transition(SessionStatus::Playing);
        }
        if *encoding != self.rules.initial_encoding() {
            self.history_detached = true;
            self.request_move_log(assignment.match_id);
        }
        self.follow(assignment.match_id);
    }

    fn on_remote(&mut self, change: StoreChange) {
        if !matches!(self.session.status, SessionStatus::Waiting | SessionStatus::Playing) {
            trace!("🗑️ Ignoring remote change while {}", self.session.status);
            return;
        }

        match change {
            StoreChange::MoveInserted(record) => {
                if let MoveDisposition::Applied(notation) = self.sync.on_move_inserted(&mut self.session, &record) {
                    debug!("📥 Opponent played {}", notation);
                }
            }
            StoreChange::MatchUpdated(record) => {
                match self.sync.on_match_updated(&mut self.session, &record) {
                    PositionDisposition::Stale => return,
                    PositionDisposition::Detached => {
                        self.history_detached = true;
                        self.request_move_log(record.id);
                    }
                    PositionDisposition::Resynced if self.history_detached => {
                        self.request_move_log(record.id);
                    }
                    _ => {}
                }

                match (self.session.status, record.status) {
                    (SessionStatus::Waiting, MatchStatus::Playing) => {
                        info!("🤝 Opponent joined match {}", record.id);
                        self.transition(SessionStatus::Playing);
                    }
                    (SessionStatus::Playing, MatchStatus::Ended) => self.finish(),
                    _ => {}
                }
            }
        }

        if self.session.status == SessionStatus::Playing && self.outcome().is_some() {
            self.finish();
        }
    }

    fn on_move_log(&mut self, moves: Vec<MoveRecord>) {
        if !self.history_detached {
            return;
        }
        if self.sync.rebuild_history(&mut self.session, &moves) {
            self.history_detached = false;
            debug!("📜 History rebuilt from {} logged moves", moves.len());
        }
    }

    fn play_ai_move(&mut self) {
        if self.session.status != SessionStatus::Ai
            || self.rules.side_to_move(&self.session.board) != self.ai_color()
            || self.outcome().is_some()
        {
            return;
        }

        let legal = self.rules.legal_moves(&self.session.board);
        let Some(choice) = self.ai.select(&legal) else {
            return;
        };
        match self.rules.play_notation(&self.session.board, &choice.notation) {
            Ok((next, notation)) => {
                self.session.board = next;
                self.session.history.push(notation.clone());
                debug!("🤖 AI played {}", notation);
            }
            Err(e) => error!("🤖 AI chose an unplayable move {}: {}", choice.notation, e),
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Handle to a running session; the only surface a presentation layer uses.
///
/// Commands are answered once the session has applied them, and the state
/// published through [`subscribe_state`](Self::subscribe_state) already
/// reflects the change by then. Dropping the handle stops the session and
/// every task it owns.
pub struct MatchCoordinator<R: RulesEngine> {
    rules: Arc<R>,
    inbox: mpsc::Sender<Inbound>,
    state: watch::Receiver<SessionSnapshot>,
    presence: Option<PresenceTracker>,
    anonymous_key_prefix: String,
    actor: Option<JoinHandle<()>>,
}

impl<R: RulesEngine> std::fmt::Debug for MatchCoordinator<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchCoordinator")
            .field("game", &self.rules.name())
            .field("state", &*self.state.borrow())
            .field("presence", &self.presence)
            .finish()
    }
}

impl<R: RulesEngine> MatchCoordinator<R> {
    /// Starts a session actor in `Local` status.
    ///
    /// # Arguments
    ///
    /// * `rules` - Rules engine for the game being played
    /// * `store` - Shared store used for matchmaking and move sync
    /// * `config` - Timing and sizing options
    pub fn spawn(rules: R, store: Arc<dyn MatchStore>, config: CoordinatorConfig) -> Self {
        let rules = Arc::new(rules);
        let (inbox_tx, inbox_rx) = mpsc::channel(config.inbox_capacity.max(1));
        let session = LocalSession::new(rules.initial());
        let (state_tx, state_rx) = watch::channel(session.snapshot(rules.as_ref()));
        let anonymous_key_prefix = config.anonymous_key_prefix.clone();

        let actor = SessionActor {
            rules: Arc::clone(&rules),
            matchmaking: MatchmakingService::new(Arc::clone(&store), rules.initial_encoding()),
            sync: MoveSynchronizer::new(Arc::clone(&rules)),
            ai: AiMoveSelector::new(),
            store,
            config,
            session,
            generation: 0,
            matchmaking_in_flight: false,
            history_detached: false,
            scope: SessionScope::new(),
            inbox: inbox_tx.clone(),
            state: state_tx,
        };
        let actor = tokio::spawn(actor.run(inbox_rx));

        Self {
            rules,
            inbox: inbox_tx,
            state: state_rx,
            presence: None,
            anonymous_key_prefix,
            actor: Some(actor),
        }
    }

    /// Announces this client on `channel` and tracks the online count.
    ///
    /// `player` is the identity provider's player ID, `None` for anonymous
    /// viewers.
    pub async fn with_presence(
        mut self,
        channel: Arc<dyn PresenceChannel>,
        player: Option<&PlayerId>,
    ) -> Result<Self, PresenceError> {
        let tracker = PresenceTracker::connect(channel, player, &self.anonymous_key_prefix).await?;
        self.presence = Some(tracker);
        Ok(self)
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SessionError> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(Inbound::Command(command(reply)))
            .await
            .map_err(|_| SessionError::Stopped)?;
        response.await.map_err(|_| SessionError::Stopped)?
    }

    /// Resets to a fresh pass-and-play board. Legal from every state.
    pub async fn start_local_game(&self) -> Result<(), SessionError> {
        self.request(Command::StartLocalGame).await
    }

    /// Starts a game against the AI with the local player moving first.
    pub async fn start_ai_game(&self) -> Result<(), SessionError> {
        self.request(Command::StartAiGame).await
    }

    /// Enters `Waiting` and looks for an opponent in the background.
    ///
    /// Returns as soon as the search has started; the published state moves
    /// to `Playing` once an opponent is paired. From `Waiting` this retries a
    /// search that failed against the store.
    pub async fn start_matchmaking(&self, player: PlayerId) -> Result<(), SessionError> {
        self.request(|reply| Command::StartMatchmaking { player, reply }).await
    }

    /// Validates and applies a move for the local player.
    ///
    /// # Returns
    ///
    /// The canonical notation of the applied move.
    pub async fn apply_move(&self, candidate: MoveCandidate) -> Result<String, SessionError> {
        self.request(|reply| Command::ApplyMove { candidate, reply }).await
    }

    /// Leaves matchmaking, a networked match or an AI game.
    pub async fn cancel_or_exit(&self) -> Result<(), SessionError> {
        self.request(Command::CancelOrExit).await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> CoordinatorState {
        CoordinatorState {
            session: self.snapshot(),
            online_count: self.online_count(),
        }
    }

    /// Receiver notified on every session state change.
    pub fn subscribe_state(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    /// Connected players, or 0 when presence is not tracked.
    pub fn online_count(&self) -> usize {
        self.presence.as_ref().map_or(0, PresenceTracker::online_count)
    }

    pub fn watch_online(&self) -> Option<watch::Receiver<usize>> {
        self.presence.as_ref().map(PresenceTracker::watch)
    }

    pub fn presence_key(&self) -> Option<&PresenceKey> {
        self.presence.as_ref().map(PresenceTracker::key)
    }

    pub fn rules(&self) -> &R {
        &self.rules
    }

    /// Position of a game still in progress.
    fn live_position(&self) -> Option<R::Position> {
        let state = self.state.borrow();
        if state.outcome.is_some() {
            return None;
        }
        self.rules.decode(&state.board_encoding).ok()
    }

    /// Legal moves in the current position; empty once the game is decided.
    pub fn legal_moves(&self) -> Vec<LegalMove> {
        self.live_position()
            .map(|position| self.rules.legal_moves(&position))
            .unwrap_or_default()
    }

    /// Legal moves starting on `square`, for target highlighting.
    pub fn legal_moves_from(&self, square: &str) -> Vec<LegalMove> {
        self.live_position()
            .map(|position| self.rules.legal_moves_from(&position, square))
            .unwrap_or_default()
    }

    /// Stops the session actor and withdraws presence.
    pub async fn shutdown(mut self) {
        let _ = self.inbox.send(Inbound::Command(Command::Shutdown)).await;
        if let Some(actor) = self.actor.take() {
            let _ = actor.await;
        }
        if let Some(presence) = self.presence.take() {
            presence.leave().await;
        }
    }
}

impl<R: RulesEngine> Drop for MatchCoordinator<R> {
    fn drop(&mut self) {
        if let Some(actor) = self.actor.take() {
            actor.abort();
        }
    }
}
