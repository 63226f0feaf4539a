use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::constants::{
    BROADCAST_CHANNEL_CAPACITY, MAX_SEND_ATTEMPTS, SEND_CONFIRM_DELAY, SEND_RETRY_DELAY,
};
use crate::models::{SendStatus, StatusUpdate};
use crate::store::SharedNotificationStore;

/// Attempt bound and delays for reply delivery. The retry delay is a constant,
/// not a backoff curve, and delivery has no acknowledgment, so the confirm
/// delay is best-effort.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub confirm_delay: Duration,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_SEND_ATTEMPTS,
            retry_delay: SEND_RETRY_DELAY,
            confirm_delay: SEND_CONFIRM_DELAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    /// No stored notification in the conversation carries a reply action.
    /// Not retryable; nothing was invoked.
    #[error("no reply action available for conversation {0}")]
    NoReplyAction(String),
    #[error("delivery failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Replays a generated reply through the originating app's captured reply
/// action, with a bounded retry loop. Per-conversation statuses are kept in
/// memory and every transition is broadcast for the host UI.
pub struct ReplyDispatcher {
    store: SharedNotificationStore,
    policy: DispatchPolicy,
    statuses: Arc<RwLock<HashMap<String, SendStatus>>>,
    status_tx: broadcast::Sender<StatusUpdate>,
}

impl ReplyDispatcher {
    pub fn new(store: SharedNotificationStore) -> Self {
        Self::with_policy(store, DispatchPolicy::default())
    }

    pub fn with_policy(store: SharedNotificationStore, policy: DispatchPolicy) -> Self {
        let (status_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        Self {
            store,
            policy,
            statuses: Arc::new(RwLock::new(HashMap::new())),
            status_tx,
        }
    }

    /// Subscribe to status transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status_tx.subscribe()
    }

    /// Current status for a conversation; Idle when nothing was ever sent.
    pub fn status(&self, conversation_id: &str) -> SendStatus {
        self.statuses
            .read()
            .get(conversation_id)
            .copied()
            .unwrap_or(SendStatus::Idle)
    }

    fn set_status(&self, conversation_id: &str, status: SendStatus, message: Option<String>) {
        self.statuses
            .write()
            .insert(conversation_id.to_string(), status);
        // Send fails only when nobody is subscribed, which is fine
        let _ = self
            .status_tx
            .send(StatusUpdate::new(conversation_id, status, message));
    }

    /// Deliver `text` through the first usable reply action captured for this
    /// conversation, retrying up to the policy's attempt bound.
    pub async fn send_reply(&self, conversation_id: &str, text: &str) -> Result<(), DispatchError> {
        let target = self
            .store
            .by_conversation(conversation_id)
            .into_iter()
            .find_map(|n| n.reply_action.clone().map(|a| (n.content_hash.clone(), a)));

        let Some((source_hash, action)) = target else {
            warn!(conversation = %conversation_id, "no reply action captured");
            self.set_status(
                conversation_id,
                SendStatus::Failed,
                Some("no reply action available".to_string()),
            );
            return Err(DispatchError::NoReplyAction(conversation_id.to_string()));
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.set_status(conversation_id, SendStatus::Sending, None);

            match action.deliver(text) {
                Ok(()) => {
                    // No delivery acknowledgment exists; give the host app a
                    // moment before declaring success.
                    tokio::time::sleep(self.policy.confirm_delay).await;
                    self.store.mark_sent(&source_hash);
                    info!(conversation = %conversation_id, attempt, "reply delivered");
                    self.set_status(conversation_id, SendStatus::Sent, None);
                    return Ok(());
                }
                Err(e) => {
                    if attempt >= self.policy.max_attempts {
                        warn!(
                            conversation = %conversation_id,
                            attempt,
                            error = %e,
                            "reply delivery exhausted"
                        );
                        self.set_status(
                            conversation_id,
                            SendStatus::Failed,
                            Some(e.to_string()),
                        );
                        return Err(DispatchError::Exhausted {
                            attempts: attempt,
                            last_error: e.to_string(),
                        });
                    }

                    warn!(
                        conversation = %conversation_id,
                        attempt,
                        error = %e,
                        "reply delivery failed, retrying"
                    );
                    self.set_status(
                        conversation_id,
                        SendStatus::Retrying,
                        Some(e.to_string()),
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CapturedNotification, IncomingNotification, ReplyAction};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Reply action that fails the first `fail_first` invocations.
    struct FlakyAction {
        fail_first: u32,
        calls: AtomicU32,
    }

    impl FlakyAction {
        fn new(fail_first: u32) -> Self {
            Self {
                fail_first,
                calls: AtomicU32::new(0),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ReplyAction for FlakyAction {
        fn deliver(&self, _text: &str) -> anyhow::Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                anyhow::bail!("send intent cancelled");
            }
            Ok(())
        }
    }

    fn test_policy() -> DispatchPolicy {
        DispatchPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
            confirm_delay: Duration::from_millis(1),
        }
    }

    fn insert_with_action(
        store: &SharedNotificationStore,
        action: Option<Arc<dyn ReplyAction>>,
    ) -> CapturedNotification {
        let incoming = IncomingNotification {
            title: "Sam".to_string(),
            text: "are we still on for lunch?".to_string(),
            app_id: "com.whatsapp".to_string(),
            timestamp: 1,
            sender: Some("Sam".to_string()),
            group_title: None,
            can_reply: action.is_some(),
        };
        let n = CapturedNotification::from_incoming(&incoming, action);
        store.add(n.clone());
        n
    }

    fn drain_statuses(rx: &mut broadcast::Receiver<StatusUpdate>) -> Vec<SendStatus> {
        let mut statuses = Vec::new();
        while let Ok(update) = rx.try_recv() {
            statuses.push(update.status);
        }
        statuses
    }

    #[tokio::test]
    async fn test_no_reply_action_fails_without_invoking() {
        let store = SharedNotificationStore::new();
        let n = insert_with_action(&store, None);

        let dispatcher = ReplyDispatcher::with_policy(store.clone(), test_policy());
        let err = dispatcher
            .send_reply(&n.conversation_id, "on my way")
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::NoReplyAction(_)));
        assert_eq!(dispatcher.status(&n.conversation_id), SendStatus::Failed);
        assert!(!store.get(&n.content_hash).unwrap().sent);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt_and_marks_sent() {
        let store = SharedNotificationStore::new();
        let action = Arc::new(FlakyAction::new(2));
        let n = insert_with_action(&store, Some(action.clone()));

        let dispatcher = ReplyDispatcher::with_policy(store.clone(), test_policy());
        dispatcher
            .send_reply(&n.conversation_id, "on my way")
            .await
            .unwrap();

        assert_eq!(action.calls(), 3);
        assert_eq!(dispatcher.status(&n.conversation_id), SendStatus::Sent);
        assert!(store.get(&n.content_hash).unwrap().sent);
    }

    #[tokio::test]
    async fn test_exhaustion_is_terminal_failure() {
        let store = SharedNotificationStore::new();
        let action = Arc::new(FlakyAction::new(u32::MAX));
        let n = insert_with_action(&store, Some(action.clone()));

        let dispatcher = ReplyDispatcher::with_policy(store.clone(), test_policy());
        let mut rx = dispatcher.subscribe();

        let err = dispatcher
            .send_reply(&n.conversation_id, "on my way")
            .await
            .unwrap_err();

        match err {
            DispatchError::Exhausted {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("send intent cancelled"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(action.calls(), 3);
        assert!(!store.get(&n.content_hash).unwrap().sent);

        let statuses = drain_statuses(&mut rx);
        assert_eq!(
            statuses,
            vec![
                SendStatus::Sending,
                SendStatus::Retrying,
                SendStatus::Sending,
                SendStatus::Retrying,
                SendStatus::Sending,
                SendStatus::Failed,
            ]
        );
    }

    #[tokio::test]
    async fn test_status_starts_idle() {
        let dispatcher = ReplyDispatcher::new(SharedNotificationStore::new());
        assert_eq!(dispatcher.status("com.whatsapp:Sam"), SendStatus::Idle);
    }

    #[tokio::test]
    async fn test_uses_newest_notification_with_action() {
        let store = SharedNotificationStore::new();
        // Older entry without an action, newer one with
        insert_with_action(&store, None);
        let action = Arc::new(FlakyAction::new(0));
        let incoming = IncomingNotification {
            title: "Sam".to_string(),
            text: "second message".to_string(),
            app_id: "com.whatsapp".to_string(),
            timestamp: 2,
            sender: Some("Sam".to_string()),
            group_title: None,
            can_reply: true,
        };
        let newer = CapturedNotification::from_incoming(&incoming, Some(action.clone()));
        let newer_hash = newer.content_hash.clone();
        store.add(newer.clone());

        let dispatcher = ReplyDispatcher::with_policy(store.clone(), test_policy());
        dispatcher
            .send_reply(&newer.conversation_id, "ok")
            .await
            .unwrap();

        assert_eq!(action.calls(), 1);
        assert!(store.get(&newer_hash).unwrap().sent);
    }
}
