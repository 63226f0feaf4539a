use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Host-captured reply handle for a notification.
///
/// On-device this wraps the originating app's reply action and its text-input
/// slot; invoking it delivers a reply back through that app without any
/// cooperation beyond the exposed action. Headless hosts (the gateway, tests)
/// provide their own implementations.
pub trait ReplyAction: Send + Sync {
    fn deliver(&self, text: &str) -> Result<()>;
}

/// Local echo of a capture, re-posted by the host so the user sees what was
/// observed. The listener fires this once per fresh insert.
pub trait EchoNotifier: Send + Sync {
    fn notify(&self, title: &str, summary: &str);
}

/// A notification as delivered by the host platform, before capture.
/// Wire-facing: the gateway reads these as NDJSON records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingNotification {
    pub title: String,
    pub text: String,
    pub app_id: String,
    /// Platform epoch millis
    pub timestamp: u64,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde(default)]
    pub group_title: Option<String>,
    /// Whether the originating app exposed a reply action
    #[serde(default)]
    pub can_reply: bool,
}

/// One captured external notification, as held by the store.
#[derive(Clone)]
pub struct CapturedNotification {
    pub title: String,
    pub text: String,
    pub app_id: String,
    pub timestamp: u64,
    pub sender: Option<String>,
    pub group_title: Option<String>,
    /// Grouping key associating entries of the same chat thread
    pub conversation_id: String,
    pub has_reply_action: bool,
    /// Present only when `has_reply_action` is true
    pub reply_action: Option<Arc<dyn ReplyAction>>,
    /// Deterministic digest of (title, text, app_id), unique within the store
    pub content_hash: String,
    /// Empty until a reply has been generated
    pub ai_reply: String,
    pub sent: bool,
}

impl CapturedNotification {
    /// Build a captured entry from a platform delivery, computing the content
    /// hash and conversation grouping key.
    pub fn from_incoming(
        incoming: &IncomingNotification,
        reply_action: Option<Arc<dyn ReplyAction>>,
    ) -> Self {
        let content_hash = content_hash(&incoming.title, &incoming.text, &incoming.app_id);
        let conversation_id = conversation_id(
            &incoming.app_id,
            incoming.group_title.as_deref(),
            incoming.sender.as_deref(),
            &incoming.title,
        );
        let has_reply_action = incoming.can_reply && reply_action.is_some();

        Self {
            title: incoming.title.clone(),
            text: incoming.text.clone(),
            app_id: incoming.app_id.clone(),
            timestamp: incoming.timestamp,
            sender: incoming.sender.clone(),
            group_title: incoming.group_title.clone(),
            conversation_id,
            has_reply_action,
            reply_action: if has_reply_action { reply_action } else { None },
            content_hash,
            ai_reply: String::new(),
            sent: false,
        }
    }

    pub fn is_group_chat(&self) -> bool {
        self.group_title.is_some()
    }
}

impl fmt::Debug for CapturedNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedNotification")
            .field("title", &self.title)
            .field("text", &self.text)
            .field("app_id", &self.app_id)
            .field("timestamp", &self.timestamp)
            .field("sender", &self.sender)
            .field("group_title", &self.group_title)
            .field("conversation_id", &self.conversation_id)
            .field("has_reply_action", &self.has_reply_action)
            .field("content_hash", &self.content_hash)
            .field("ai_reply", &self.ai_reply)
            .field("sent", &self.sent)
            .finish()
    }
}

/// Deterministic content hash over (title, text, app id), used for dedup.
///
/// SHA-256 for stability across Rust versions; hex-encoded for logging and
/// channel payloads.
pub fn content_hash(title: &str, text: &str, app_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    hasher.update([0u8]);
    hasher.update(app_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the conversation grouping key for a capture.
///
/// Group chats share a group title across senders, so the group title wins;
/// otherwise the sender, falling back to the notification title for apps that
/// put the sender name there.
pub fn conversation_id(
    app_id: &str,
    group_title: Option<&str>,
    sender: Option<&str>,
    title: &str,
) -> String {
    let thread = group_title.or(sender).unwrap_or(title);
    format!("{}:{}", app_id, thread)
}
