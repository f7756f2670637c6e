//! # Session Lifecycle
//!
//! A session is one client's view of a game: pass-and-play, a game against the
//! AI, or a networked match. Its status moves through this table and nothing
//! else:
//!
//! | From                  | Operation / event          | To        |
//! |-----------------------|----------------------------|-----------|
//! | any                   | `start_local_game`         | `Local`   |
//! | `Local`               | `start_ai_game`            | `Ai`      |
//! | `Local`               | `start_matchmaking`        | `Waiting` |
//! | `Waiting`             | joined / opponent joined   | `Playing` |
//! | `Playing`             | terminal position          | `Ended`   |
//! | `Waiting`, `Playing`, `Ai` | `cancel_or_exit`      | `Local`   |
//!
//! Anything else is rejected with [`SessionError::IllegalTransition`] and
//! leaves the session untouched.
//!
//! [`SessionError::IllegalTransition`]: crate::error::SessionError::IllegalTransition

pub mod coordinator;
pub mod scope;
pub mod state;

pub use coordinator::MatchCoordinator;
pub use scope::SessionScope;
pub use state::{CoordinatorState, LocalSession, Operation, SessionSnapshot};
