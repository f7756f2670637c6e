//! In-memory presence channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use super::{PresenceChannel, PresenceEvent};
use crate::error::PresenceError;
use crate::types::{PresenceEntry, PresenceKey};

/// Process-local [`PresenceChannel`].
///
/// A key stays present while at least one announcement for it is active, so a
/// player connected from two clients counts once and leaves once both go.
#[derive(Debug)]
pub struct MemoryPresence {
    members: DashMap<PresenceKey, (PresenceEntry, usize)>,
    sender: broadcast::Sender<PresenceEvent>,
    closed: AtomicBool,
}

impl MemoryPresence {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a channel whose notification buffer holds `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            members: DashMap::new(),
            sender,
            closed: AtomicBool::new(false),
        }
    }

    /// Shuts the channel down: membership is dropped and every later
    /// announcement or snapshot fails with [`PresenceError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.members.clear();
        self.broadcast(PresenceEvent::Sync(Vec::new()));
        debug!("🚪 Presence channel closed");
    }

    fn check_open(&self) -> Result<(), PresenceError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PresenceError::Closed);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    fn entries(&self) -> Vec<PresenceEntry> {
        self.members.iter().map(|m| m.value().0.clone()).collect()
    }

    fn broadcast(&self, event: PresenceEvent) {
        // No receivers is fine; nobody is watching yet.
        let _ = self.sender.send(event);
    }
}

impl Default for MemoryPresence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresenceChannel for MemoryPresence {
    async fn track(&self, key: PresenceKey) -> Result<(), PresenceError> {
        self.check_open()?;
        let entry = PresenceEntry {
            key: key.clone(),
            last_seen: Utc::now(),
        };
        let joined = {
            let mut slot = self.members.entry(key).or_insert_with(|| (entry.clone(), 0));
            slot.0.last_seen = entry.last_seen;
            slot.1 += 1;
            slot.1 == 1
        };
        if joined {
            trace!("➕ Presence join {}", entry.key);
            self.broadcast(PresenceEvent::Join(entry));
        }
        self.broadcast(PresenceEvent::Sync(self.entries()));
        Ok(())
    }

    async fn untrack(&self, key: &PresenceKey) {
        let left = match self.members.get_mut(key) {
            Some(mut slot) => {
                slot.1 = slot.1.saturating_sub(1);
                slot.1 == 0
            }
            None => return,
        };
        if left {
            self.members.remove_if(key, |_, slot| slot.1 == 0);
            trace!("➖ Presence leave {}", key);
            self.broadcast(PresenceEvent::Leave(key.clone()));
        }
        self.broadcast(PresenceEvent::Sync(self.entries()));
    }

    async fn snapshot(&self) -> Result<Vec<PresenceEntry>, PresenceError> {
        self.check_open()?;
        Ok(self.entries())
    }

    fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.sender.subscribe()
    }
}

/// Named presence channels sharing one process.
///
/// Clients configured with the same channel name see each other; different
/// names are separate rooms.
#[derive(Debug, Default)]
pub struct MemoryPresenceHub {
    channels: DashMap<String, Arc<MemoryPresence>>,
}

impl MemoryPresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The channel called `name`, created on first use.
    pub fn channel(&self, name: &str) -> Arc<MemoryPresence> {
        Arc::clone(self.channels.entry(name.to_string()).or_default().value())
    }
}
