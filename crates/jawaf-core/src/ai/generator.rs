use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::client::CompletionClient;
use super::prompt;
use crate::models::Persona;
use crate::store::SharedNotificationStore;

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no stored notification for hash {0}")]
    NotFound(String),
    #[error("completion failed: {0}")]
    Completion(String),
}

/// Builds a contextual prompt for a captured notification and asks the
/// completion client for a reply. Successful replies are written back into
/// the store under the notification's content hash.
pub struct ReplyGenerator {
    store: SharedNotificationStore,
    client: Arc<dyn CompletionClient>,
}

impl ReplyGenerator {
    pub fn new(store: SharedNotificationStore, client: Arc<dyn CompletionClient>) -> Self {
        Self { store, client }
    }

    /// Generate a reply for the notification with this content hash, using up
    /// to `context_limit` prior same-conversation messages as transcript.
    ///
    /// Every failure mode comes back as a `GenerateError`; nothing here may
    /// take down the pipeline.
    pub async fn generate_reply(
        &self,
        hash: &str,
        persona: &Persona,
        context_limit: usize,
    ) -> Result<String, GenerateError> {
        let notification = self
            .store
            .get(hash)
            .ok_or_else(|| GenerateError::NotFound(hash.to_string()))?;

        // The notification itself is already in the store; fetch one extra so
        // dropping it still leaves up to `context_limit` prior messages.
        let mut context = self
            .store
            .conversation_context(&notification.conversation_id, context_limit + 1);
        context.retain(|n| n.content_hash != notification.content_hash);
        if context.len() > context_limit {
            let excess = context.len() - context_limit;
            context.drain(..excess);
        }

        let messages = prompt::build_messages(&notification, &context, persona);
        debug!(
            hash = %hash,
            conversation = %notification.conversation_id,
            context_len = context.len(),
            "requesting completion"
        );

        let reply = self
            .client
            .complete(&messages)
            .await
            .map_err(|e| GenerateError::Completion(e.to_string()))?;

        if !self.store.update_ai_reply(hash, &reply) {
            // Entry evicted while the call was in flight; the reply is still
            // returned to the caller.
            warn!(hash = %hash, "generated reply for evicted notification");
        }

        Ok(reply)
    }
}
