//! # Core Type Definitions
//!
//! This module contains the fundamental types shared by every component of the
//! match coordinator: identifiers, colors, the two persisted records (matches
//! and moves) and the ephemeral presence entries.
//!
//! ## Key Types
//!
//! - [`PlayerId`] - Opaque player identifier supplied by the identity provider
//! - [`MatchId`] - Unique identifier for a match record in the shared store
//! - [`MatchRecord`] / [`MoveRecord`] - The persisted schema
//! - [`SessionStatus`] - Lifecycle state of a client's local session
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types prevent ID confusion (PlayerId vs MatchId)
//! - **Serialization**: All records support serde for storage and transport
//! - **Store Authority**: Records are snapshots; the shared store owns the truth

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier for an authenticated player.
///
/// The identity provider hands the coordinator a plain string; nothing in this
/// crate interprets its contents beyond equality.
///
/// # Examples
///
/// ```rust
/// use match_coordinator::PlayerId;
///
/// let player = PlayerId::new("p1");
/// assert_eq!(player.as_str(), "p1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Unique identifier for a match record.
///
/// Generated by the store on insert using UUID v4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatchId(pub Uuid);

impl MatchId {
    /// Creates a new random match ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MatchId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

// ============================================================================
// Sides and Status
// ============================================================================

/// One of the two sides of a board game.
///
/// White always moves first. Games that name their sides differently
/// (tic-tac-toe's X and O) map the first mover to `White`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Returns the other side.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::White => Self::Black,
            Self::Black => Self::White,
        }
    }

    /// Side to move after `plies` half-moves from the initial position.
    #[must_use]
    pub const fn after_plies(plies: usize) -> Self {
        if plies % 2 == 0 {
            Self::White
        } else {
            Self::Black
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// Status of a match record in the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Host created the match and nobody has joined yet
    Waiting,
    /// Both seats are taken
    Playing,
    /// The rules engine reported a terminal position
    Ended,
}

/// Lifecycle state of a client's local session.
///
/// Exactly one of these holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Pass-and-play on a single client (initial state)
    Local,
    /// Matchmaking in progress or waiting for an opponent to join
    Waiting,
    /// Networked match with both seats taken
    Playing,
    /// Playing against the built-in AI
    Ai,
    /// Networked match reached a terminal position
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Ai => "ai",
            Self::Ended => "ended",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Persisted Records
// ============================================================================

/// A match as stored in the shared store.
///
/// The host creates it; either player mutates `position_encoding` and
/// `status`. Clients only ever hold short-lived snapshots of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub id: MatchId,
    pub host_player_id: PlayerId,
    pub guest_player_id: Option<PlayerId>,
    pub status: MatchStatus,
    pub position_encoding: String,
    /// Plies behind `position_encoding`; only ever grows
    #[serde(default)]
    pub move_count: u32,
    pub last_move_at: DateTime<Utc>,
}

/// Fields required to insert a new match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMatch {
    pub host_player_id: PlayerId,
    pub status: MatchStatus,
    pub position_encoding: String,
}

/// An append-only move record.
///
/// `move_number` is the 1-based ply index, so it increases strictly within a
/// match and its parity names the side that played it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveRecord {
    pub match_id: MatchId,
    pub notation: String,
    pub move_number: u32,
    pub created_at: DateTime<Utc>,
}

/// Fields required to append a move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMove {
    pub match_id: MatchId,
    pub notation: String,
    pub move_number: u32,
}

/// Row predicate used by queries and conditional updates.
///
/// Every populated field must hold for a row to match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub guest_unset: bool,
    pub host_not: Option<PlayerId>,
    /// Row must hold fewer plies than this
    pub move_count_below: Option<u32>,
}

impl MatchFilter {
    /// Rows that still have an open guest seat.
    pub fn open_seat() -> Self {
        Self {
            status: Some(MatchStatus::Waiting),
            guest_unset: true,
            host_not: None,
            move_count_below: None,
        }
    }

    /// Open seats hosted by someone other than `player_id`.
    pub fn joinable_by(player_id: &PlayerId) -> Self {
        Self {
            host_not: Some(player_id.clone()),
            ..Self::open_seat()
        }
    }

    /// Rows whose stored position is older than ply `move_count`.
    ///
    /// Guards position writes so a delayed write can never move a match
    /// backwards.
    pub fn behind(move_count: u32) -> Self {
        Self {
            move_count_below: Some(move_count),
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &MatchRecord) -> bool {
        if let Some(status) = self.status {
            if record.status != status {
                return false;
            }
        }
        if self.guest_unset && record.guest_player_id.is_some() {
            return false;
        }
        if let Some(host) = &self.host_not {
            if &record.host_player_id == host {
                return false;
            }
        }
        if let Some(limit) = self.move_count_below {
            if record.move_count >= limit {
                return false;
            }
        }
        true
    }
}

/// Partial update applied to a match row. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPatch {
    pub guest_player_id: Option<PlayerId>,
    pub status: Option<MatchStatus>,
    pub position_encoding: Option<String>,
    pub move_count: Option<u32>,
    pub touch_last_move_at: bool,
}

impl MatchPatch {
    /// Claims the guest seat and starts the match in one write.
    pub fn join(guest: PlayerId) -> Self {
        Self {
            guest_player_id: Some(guest),
            status: Some(MatchStatus::Playing),
            ..Self::default()
        }
    }

    /// Ends a match, used by a host abandoning its open seat.
    pub fn close() -> Self {
        Self {
            status: Some(MatchStatus::Ended),
            ..Self::default()
        }
    }

    /// Publishes the position reached after ply `move_count`.
    pub fn position(encoding: String, move_count: u32, status: Option<MatchStatus>) -> Self {
        Self {
            position_encoding: Some(encoding),
            move_count: Some(move_count),
            status,
            touch_last_move_at: true,
            ..Self::default()
        }
    }

    pub fn apply(self, record: &mut MatchRecord, now: DateTime<Utc>) {
        if let Some(guest) = self.guest_player_id {
            record.guest_player_id = Some(guest);
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(encoding) = self.position_encoding {
            record.position_encoding = encoding;
        }
        if let Some(move_count) = self.move_count {
            record.move_count = move_count;
        }
        if self.touch_last_move_at {
            record.last_move_at = now;
        }
    }
}

// ============================================================================
// Presence
// ============================================================================

/// Key under which a client announces itself on the presence channel.
///
/// Authenticated players use their player ID; anonymous viewers get a
/// generated `guest-` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PresenceKey(pub String);

impl std::fmt::Display for PresenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&PlayerId> for PresenceKey {
    fn from(player: &PlayerId) -> Self {
        Self(player.0.clone())
    }
}

/// One member of the presence set. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEntry {
    pub key: PresenceKey,
    pub last_seen: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(host: &str, guest: Option<&str>, status: MatchStatus) -> MatchRecord {
        MatchRecord {
            id: MatchId::new(),
            host_player_id: PlayerId::new(host),
            guest_player_id: guest.map(PlayerId::new),
            status,
            position_encoding: String::new(),
            move_count: 0,
            last_move_at: Utc::now(),
        }
    }

    #[test]
    fn test_position_filter_only_moves_forward() {
        let mut rec = record("p1", Some("p2"), MatchStatus::Playing);
        MatchPatch::position("after-e4".into(), 1, None).apply(&mut rec, Utc::now());

        assert_eq!(rec.move_count, 1);
        assert!(MatchFilter::behind(2).matches(&rec));
        assert!(!MatchFilter::behind(1).matches(&rec));
        assert!(!MatchFilter::behind(0).matches(&rec));
    }

    #[test]
    fn test_joinable_filter_excludes_own_and_taken_matches() {
        let filter = MatchFilter::joinable_by(&PlayerId::new("p2"));

        assert!(filter.matches(&record("p1", None, MatchStatus::Waiting)));
        assert!(!filter.matches(&record("p2", None, MatchStatus::Waiting)));
        assert!(!filter.matches(&record("p1", Some("p3"), MatchStatus::Waiting)));
        assert!(!filter.matches(&record("p1", None, MatchStatus::Playing)));
    }

    #[test]
    fn test_join_patch_sets_guest_and_status_together() {
        let mut rec = record("p1", None, MatchStatus::Waiting);
        let before = rec.last_move_at;
        MatchPatch::join(PlayerId::new("p2")).apply(&mut rec, Utc::now());

        assert_eq!(rec.guest_player_id, Some(PlayerId::new("p2")));
        assert_eq!(rec.status, MatchStatus::Playing);
        assert_eq!(rec.last_move_at, before);
    }

    #[test]
    fn test_color_after_plies() {
        assert_eq!(Color::after_plies(0), Color::White);
        assert_eq!(Color::after_plies(1), Color::Black);
        assert_eq!(Color::after_plies(2), Color::White);
        assert_eq!(Color::White.opposite(), Color::Black);
    }
}
