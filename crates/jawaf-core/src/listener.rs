use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::ai::prompt::app_display_name;
use crate::models::{CapturedNotification, EchoNotifier, IncomingNotification, ReplyAction};
use crate::store::SharedNotificationStore;

/// Receives every platform-delivered notification, filters out the host app's
/// own, and forwards fresh captures to the store and the echo notifier.
///
/// Connection state is just a flag reported by the platform lifecycle
/// callbacks; removal events are logged, not acted upon.
pub struct NotificationListener {
    store: SharedNotificationStore,
    own_app_id: String,
    echo: Option<Arc<dyn EchoNotifier>>,
    connected: AtomicBool,
}

impl NotificationListener {
    pub fn new(store: SharedNotificationStore, own_app_id: impl Into<String>) -> Self {
        Self {
            store,
            own_app_id: own_app_id.into(),
            echo: None,
            connected: AtomicBool::new(false),
        }
    }

    pub fn with_echo(
        store: SharedNotificationStore,
        own_app_id: impl Into<String>,
        echo: Arc<dyn EchoNotifier>,
    ) -> Self {
        Self {
            store,
            own_app_id: own_app_id.into(),
            echo: Some(echo),
            connected: AtomicBool::new(false),
        }
    }

    // ===== Lifecycle =====

    pub fn on_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
        info!("notification listener connected");
    }

    pub fn on_disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        info!("notification listener disconnected");
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    // ===== Callbacks =====

    /// Handle a posted notification. Returns the content hash when the entry
    /// was freshly captured; None for self-notifications and duplicates.
    pub fn handle_posted(
        &self,
        incoming: &IncomingNotification,
        reply_action: Option<Arc<dyn ReplyAction>>,
    ) -> Option<String> {
        if incoming.app_id == self.own_app_id {
            debug!(app = %incoming.app_id, "skipping own notification");
            return None;
        }

        let notification = CapturedNotification::from_incoming(incoming, reply_action);
        let hash = notification.content_hash.clone();
        let title = notification.title.clone();
        let text = notification.text.clone();
        let app_name = app_display_name(&notification.app_id).to_string();

        if !self.store.add(notification) {
            return None;
        }

        info!(
            app = %incoming.app_id,
            hash = %hash,
            "captured notification"
        );

        if let Some(echo) = &self.echo {
            echo.notify(&format!("{} · {}", app_name, title), &text);
        }

        Some(hash)
    }

    /// Removal events carry no action for us; log and move on.
    pub fn handle_removed(&self, incoming: &IncomingNotification) {
        debug!(
            app = %incoming.app_id,
            title = %incoming.title,
            "notification removed"
        );
    }
}
