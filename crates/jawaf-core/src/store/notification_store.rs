use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::constants::MAX_STORED_NOTIFICATIONS;
use crate::models::CapturedNotification;

/// Bounded, de-duplicated log of captured notifications, newest-first.
///
/// Entries are indexed by content hash so reply/sent updates are O(1) instead
/// of a scan, and the dedup check happens in the same structure that holds the
/// entries. Eviction drops the oldest entry and its hash together. Nothing is
/// persisted; contents die with the process.
pub struct NotificationStore {
    /// Entry per content hash
    entries: HashMap<String, CapturedNotification>,
    /// Hashes in newest-first order; parallel to `entries`
    order: VecDeque<String>,
    capacity: usize,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_STORED_NOTIFICATIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Insert at the head if the content hash is unseen. Returns whether the
    /// entry was inserted. May evict the oldest entry to stay within capacity.
    pub fn add(&mut self, notification: CapturedNotification) -> bool {
        let hash = notification.content_hash.clone();
        if self.entries.contains_key(&hash) {
            debug!(hash = %hash, "duplicate notification dropped");
            return false;
        }

        self.order.push_front(hash.clone());
        self.entries.insert(hash, notification);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_back() {
                self.entries.remove(&evicted);
                debug!(hash = %evicted, "evicted oldest notification");
            }
        }

        true
    }

    // ===== Queries =====

    /// All entries, newest-first.
    pub fn all(&self) -> Vec<CapturedNotification> {
        self.order
            .iter()
            .filter_map(|h| self.entries.get(h))
            .cloned()
            .collect()
    }

    /// Entries for one conversation, newest-first.
    pub fn by_conversation(&self, conversation_id: &str) -> Vec<CapturedNotification> {
        self.order
            .iter()
            .filter_map(|h| self.entries.get(h))
            .filter(|n| n.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    /// Up to `limit` most-recent entries for a conversation, reordered
    /// oldest-first so they read as a chronological transcript.
    pub fn conversation_context(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Vec<CapturedNotification> {
        let mut recent: Vec<CapturedNotification> = self
            .order
            .iter()
            .filter_map(|h| self.entries.get(h))
            .filter(|n| n.conversation_id == conversation_id)
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        recent
    }

    pub fn get(&self, hash: &str) -> Option<CapturedNotification> {
        self.entries.get(hash).cloned()
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    // ===== Mutations =====

    /// Record a generated reply against the entry with this hash. An unknown
    /// hash returns false and mutates nothing; callers treat that as ordinary
    /// (the entry may simply have been evicted).
    pub fn update_ai_reply(&mut self, hash: &str, reply: &str) -> bool {
        match self.entries.get_mut(hash) {
            Some(entry) => {
                entry.ai_reply = reply.to_string();
                true
            }
            None => false,
        }
    }

    /// Flag the entry with this hash as sent. Unknown hash returns false.
    pub fn mark_sent(&mut self, hash: &str) -> bool {
        match self.entries.get_mut(hash) {
            Some(entry) => {
                entry.sent = true;
                true
            }
            None => false,
        }
    }
}

impl Default for NotificationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe handle to the store, shared between the listener (platform
/// callback side) and the engine's background tasks. All dedup-check-then-insert
/// sequences run under a single write lock.
#[derive(Clone)]
pub struct SharedNotificationStore {
    inner: Arc<RwLock<NotificationStore>>,
}

impl SharedNotificationStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(NotificationStore::new())),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(NotificationStore::with_capacity(capacity))),
        }
    }

    pub fn add(&self, notification: CapturedNotification) -> bool {
        self.inner.write().add(notification)
    }

    pub fn all(&self) -> Vec<CapturedNotification> {
        self.inner.read().all()
    }

    pub fn by_conversation(&self, conversation_id: &str) -> Vec<CapturedNotification> {
        self.inner.read().by_conversation(conversation_id)
    }

    pub fn conversation_context(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Vec<CapturedNotification> {
        self.inner.read().conversation_context(conversation_id, limit)
    }

    pub fn get(&self, hash: &str) -> Option<CapturedNotification> {
        self.inner.read().get(hash)
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.inner.read().contains(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    pub fn update_ai_reply(&self, hash: &str, reply: &str) -> bool {
        self.inner.write().update_ai_reply(hash, reply)
    }

    pub fn mark_sent(&self, hash: &str) -> bool {
        self.inner.write().mark_sent(hash)
    }
}

impl Default for SharedNotificationStore {
    fn default() -> Self {
        Self::new()
    }
}
