//! # Presence Tracking
//!
//! Keeps a live count of connected players. Each client announces itself on
//! a shared presence channel and then mirrors the channel's membership from
//! its sync/join/leave notifications.
//!
//! ## Recovery
//!
//! Membership is never persisted. When the notification stream lags or drops,
//! the tracker resubscribes and rebuilds its view from a fresh channel
//! snapshot; the count may be stale in between but is never corrupted.

pub mod memory;

pub use memory::{MemoryPresence, MemoryPresenceHub};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PresenceError;
use crate::types::{PlayerId, PresenceEntry, PresenceKey};

/// Membership notification delivered by a presence channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Full membership snapshot
    Sync(Vec<PresenceEntry>),
    /// A key joined
    Join(PresenceEntry),
    /// A key left
    Leave(PresenceKey),
}

/// Live membership feed shared by every client.
#[async_trait]
pub trait PresenceChannel: Send + Sync + 'static {
    /// Announces `key` as present.
    async fn track(&self, key: PresenceKey) -> Result<(), PresenceError>;

    /// Withdraws one announcement of `key`.
    async fn untrack(&self, key: &PresenceKey);

    /// Current membership.
    async fn snapshot(&self) -> Result<Vec<PresenceEntry>, PresenceError>;

    fn subscribe(&self) -> broadcast::Receiver<PresenceEvent>;
}

/// Generates a presence key for an unauthenticated viewer.
pub fn anonymous_key(prefix: &str) -> PresenceKey {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    PresenceKey(format!("{prefix}{suffix}"))
}

/// Client-side view of the presence channel.
///
/// Owns a background task that applies membership notifications to a local
/// key set and publishes its size. Dropping the tracker stops the task and
/// withdraws the announcement.
pub struct PresenceTracker {
    key: PresenceKey,
    channel: Arc<dyn PresenceChannel>,
    count: watch::Receiver<usize>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PresenceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceTracker")
            .field("key", &self.key)
            .field("online", &*self.count.borrow())
            .finish()
    }
}

impl PresenceTracker {
    /// Joins the presence channel.
    ///
    /// Authenticated players announce their player ID; everyone else gets a
    /// key generated with `anonymous_prefix`.
    pub async fn connect(
        channel: Arc<dyn PresenceChannel>,
        player: Option<&PlayerId>,
        anonymous_prefix: &str,
    ) -> Result<Self, PresenceError> {
        let key = match player {
            Some(player) => PresenceKey::from(player),
            None => anonymous_key(anonymous_prefix),
        };

        // Subscribe before announcing so our own join is observed.
        let events = channel.subscribe();
        channel.track(key.clone()).await?;
        let members = member_keys(channel.snapshot().await?);

        let (count_tx, count_rx) = watch::channel(members.len());
        info!("👋 Presence announced as {} ({} online)", key, members.len());

        let task = tokio::spawn(run_tracker(Arc::clone(&channel), events, members, count_tx));

        Ok(Self {
            key,
            channel,
            count: count_rx,
            task: Some(task),
        })
    }

    pub fn key(&self) -> &PresenceKey {
        &self.key
    }

    pub fn online_count(&self) -> usize {
        *self.count.borrow()
    }

    /// Receiver that observes every change of the online count.
    pub fn watch(&self) -> watch::Receiver<usize> {
        self.count.clone()
    }

    /// Withdraws the announcement and stops tracking.
    pub async fn leave(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.channel.untrack(&self.key).await;
        debug!("👋 Presence withdrawn for {}", self.key);
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        task.abort();

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let channel = Arc::clone(&self.channel);
            let key = self.key.clone();
            handle.spawn(async move {
                channel.untrack(&key).await;
            });
        }
    }
}

fn member_keys(entries: Vec<PresenceEntry>) -> HashSet<PresenceKey> {
    entries.into_iter().map(|entry| entry.key).collect()
}

async fn run_tracker(
    channel: Arc<dyn PresenceChannel>,
    mut events: broadcast::Receiver<PresenceEvent>,
    mut members: HashSet<PresenceKey>,
    count: watch::Sender<usize>,
) {
    loop {
        match events.recv().await {
            Ok(PresenceEvent::Sync(entries)) => members = member_keys(entries),
            Ok(PresenceEvent::Join(entry)) => {
                members.insert(entry.key);
            }
            Ok(PresenceEvent::Leave(key)) => {
                members.remove(&key);
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("📡 Presence feed lagged by {} events - resubscribing", skipped);
                events = channel.subscribe();
                match channel.snapshot().await {
                    Ok(entries) => members = member_keys(entries),
                    Err(e) => warn!("📡 Presence snapshot failed after lag: {}", e),
                }
            }
            Err(broadcast::error::RecvError::Closed) => {
                warn!("📡 Presence channel closed - online count is now stale");
                break;
            }
        }

        let online = members.len();
        count.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            debug!("🟢 Online count {} -> {}", current, online);
            *current = online;
            true
        });
    }
}
