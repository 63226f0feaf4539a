use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::ai::{CompletionClient, ReplyGenerator};
use crate::config::EngineConfig;
use crate::constants::{BROADCAST_CHANNEL_CAPACITY, COMMAND_CHANNEL_CAPACITY};
use crate::events::{EngineCommand, EngineEvent};
use crate::models::Persona;
use crate::store::SharedNotificationStore;

/// Cloneable handle for sending commands to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub async fn send(&self, command: EngineCommand) -> anyhow::Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("engine is not running"))
    }

    pub async fn generate_reply(&self, hash: impl Into<String>) -> anyhow::Result<()> {
        self.send(EngineCommand::GenerateReply { hash: hash.into() }).await
    }

    pub async fn reply_sent(&self, hash: impl Into<String>, success: bool) -> anyhow::Result<()> {
        self.send(EngineCommand::ReplySent {
            hash: hash.into(),
            success,
        })
        .await
    }

    pub async fn update_persona(&self, persona: Persona) -> anyhow::Result<()> {
        self.send(EngineCommand::UpdatePersona(persona)).await
    }
}

/// Coordinator between the listener, the reply generator, and the dispatch
/// side: a single task owning the command queue and the current persona.
/// Generation runs on background tasks scoped to the engine; they are aborted
/// as a unit on teardown. No retry or backpressure here, relay only.
pub struct ReplyEngine {
    handle: EngineHandle,
    event_tx: broadcast::Sender<EngineEvent>,
    worker: Option<JoinHandle<()>>,
}

impl ReplyEngine {
    pub fn spawn(
        config: EngineConfig,
        store: SharedNotificationStore,
        client: Arc<dyn CompletionClient>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (event_tx, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);

        let worker = EngineWorker {
            store: store.clone(),
            generator: Arc::new(ReplyGenerator::new(store, client)),
            persona: config.persona,
            context_limit: config.context_limit,
            command_rx,
            event_tx: event_tx.clone(),
            tasks: JoinSet::new(),
        };
        let worker = tokio::spawn(worker.run());

        Self {
            handle: EngineHandle { command_tx },
            event_tx,
            worker: Some(worker),
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// Subscribe to generated/failed reply events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.event_tx.subscribe()
    }

    /// Stop the engine, aborting in-flight generation tasks.
    pub async fn shutdown(mut self) {
        let _ = self.handle.send(EngineCommand::Shutdown).await;
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
    }
}

struct EngineWorker {
    store: SharedNotificationStore,
    generator: Arc<ReplyGenerator>,
    persona: Persona,
    context_limit: usize,
    command_rx: mpsc::Receiver<EngineCommand>,
    event_tx: broadcast::Sender<EngineEvent>,
    tasks: JoinSet<()>,
}

impl EngineWorker {
    async fn run(mut self) {
        info!("reply engine started");

        while let Some(command) = self.command_rx.recv().await {
            // Reap finished generation tasks so the set doesn't grow unbounded
            while self.tasks.try_join_next().is_some() {}

            match command {
                EngineCommand::GenerateReply { hash } => self.spawn_generation(hash),
                EngineCommand::ReplySent { hash, success } => {
                    if success {
                        if !self.store.mark_sent(&hash) {
                            debug!(hash = %hash, "sent notification no longer stored");
                        }
                    } else {
                        warn!(hash = %hash, "reply send reported failure");
                    }
                }
                EngineCommand::UpdatePersona(persona) => {
                    info!("persona updated");
                    self.persona = persona;
                }
                EngineCommand::Shutdown => break,
            }
        }

        // Teardown cancels the whole task scope together
        self.tasks.abort_all();
        info!("reply engine stopped");
    }

    fn spawn_generation(&mut self, hash: String) {
        let generator = self.generator.clone();
        let persona = self.persona.clone();
        let context_limit = self.context_limit;
        let store = self.store.clone();
        let event_tx = self.event_tx.clone();

        self.tasks.spawn(async move {
            let conversation_id = store
                .get(&hash)
                .map(|n| n.conversation_id)
                .unwrap_or_default();

            match generator.generate_reply(&hash, &persona, context_limit).await {
                Ok(reply) => {
                    debug!(hash = %hash, "reply generated");
                    let _ = event_tx.send(EngineEvent::ReplyGenerated {
                        hash,
                        conversation_id,
                        reply,
                    });
                }
                Err(e) => {
                    warn!(hash = %hash, error = %e, "reply generation failed");
                    let _ = event_tx.send(EngineEvent::ReplyFailed {
                        hash,
                        error: e.to_string(),
                    });
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatMessage;
    use anyhow::Result;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct StubClient {
        reply: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl StubClient {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionClient for StubClient {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    fn insert(store: &SharedNotificationStore, text: &str) -> String {
        let incoming = crate::models::IncomingNotification {
            title: "Sam".to_string(),
            text: text.to_string(),
            app_id: "com.whatsapp".to_string(),
            timestamp: 1,
            sender: Some("Sam".to_string()),
            group_title: None,
            can_reply: true,
        };
        let n = crate::models::CapturedNotification::from_incoming(&incoming, None);
        let hash = n.content_hash.clone();
        store.add(n);
        hash
    }

    async fn next_event(rx: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for engine event")
            .expect("event channel closed")
    }

    #[tokio::test]
    async fn test_generate_command_emits_reply_generated() {
        let store = SharedNotificationStore::new();
        let hash = insert(&store, "are we still on for lunch?");

        let engine = ReplyEngine::spawn(
            EngineConfig::default(),
            store.clone(),
            Arc::new(StubClient::new("Yes, see you at noon!")),
        );
        let mut events = engine.subscribe();

        engine.handle().generate_reply(hash.clone()).await.unwrap();

        match next_event(&mut events).await {
            EngineEvent::ReplyGenerated {
                hash: event_hash,
                conversation_id,
                reply,
            } => {
                assert_eq!(event_hash, hash);
                assert_eq!(conversation_id, "com.whatsapp:Sam");
                assert_eq!(reply, "Yes, see you at noon!");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(store.get(&hash).unwrap().ai_reply, "Yes, see you at noon!");

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_unknown_hash_emits_reply_failed() {
        let engine = ReplyEngine::spawn(
            EngineConfig::default(),
            SharedNotificationStore::new(),
            Arc::new(StubClient::new("unused")),
        );
        let mut events = engine.subscribe();

        engine.handle().generate_reply("deadbeef").await.unwrap();

        match next_event(&mut events).await {
            EngineEvent::ReplyFailed { hash, .. } => assert_eq!(hash, "deadbeef"),
            other => panic!("unexpected event: {other:?}"),
        }

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_reply_sent_marks_store_entry() {
        let store = SharedNotificationStore::new();
        let hash = insert(&store, "hello");

        let engine = ReplyEngine::spawn(
            EngineConfig::default(),
            store.clone(),
            Arc::new(StubClient::new("unused")),
        );

        engine.handle().reply_sent(hash.clone(), true).await.unwrap();
        engine.shutdown().await;

        assert!(store.get(&hash).unwrap().sent);
    }

    #[tokio::test]
    async fn test_full_pipeline_capture_to_dispatch() {
        use crate::dispatch::{DispatchPolicy, ReplyDispatcher};
        use crate::listener::NotificationListener;
        use crate::models::ReplyAction;
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct CountingAction {
            calls: AtomicUsize,
        }

        impl ReplyAction for CountingAction {
            fn deliver(&self, _text: &str) -> Result<()> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let store = SharedNotificationStore::new();
        let listener = NotificationListener::new(store.clone(), "ai.jawaf.app");
        let dispatcher = ReplyDispatcher::with_policy(
            store.clone(),
            DispatchPolicy {
                max_attempts: 3,
                retry_delay: Duration::from_millis(1),
                confirm_delay: Duration::from_millis(1),
            },
        );
        let engine = ReplyEngine::spawn(
            EngineConfig::default(),
            store.clone(),
            Arc::new(StubClient::new("Yes, see you at noon!")),
        );
        let mut events = engine.subscribe();

        let incoming = crate::models::IncomingNotification {
            title: "Sam".to_string(),
            text: "are we still on for lunch?".to_string(),
            app_id: "com.whatsapp".to_string(),
            timestamp: 1,
            sender: Some("Sam".to_string()),
            group_title: None,
            can_reply: true,
        };
        let action = Arc::new(CountingAction {
            calls: AtomicUsize::new(0),
        });
        let hash = listener
            .handle_posted(&incoming, Some(action.clone()))
            .unwrap();

        engine.handle().generate_reply(hash.clone()).await.unwrap();

        let (conversation_id, reply) = match next_event(&mut events).await {
            EngineEvent::ReplyGenerated {
                conversation_id,
                reply,
                ..
            } => (conversation_id, reply),
            other => panic!("unexpected event: {other:?}"),
        };

        dispatcher.send_reply(&conversation_id, &reply).await.unwrap();
        engine.handle().reply_sent(hash.clone(), true).await.unwrap();
        engine.shutdown().await;

        assert_eq!(action.calls.load(Ordering::SeqCst), 1);
        let entry = store.get(&hash).unwrap();
        assert_eq!(entry.ai_reply, "Yes, see you at noon!");
        assert!(entry.sent);
    }

    #[tokio::test]
    async fn test_update_persona_applies_to_later_generations() {
        let store = SharedNotificationStore::new();
        let hash = insert(&store, "hello");

        let client = Arc::new(StubClient::new("ok"));
        let engine = ReplyEngine::spawn(EngineConfig::default(), store.clone(), client.clone());
        let mut events = engine.subscribe();

        let persona = Persona {
            tone: "playful_sarcastic".to_string(),
            ..Persona::default()
        };
        engine.handle().update_persona(persona).await.unwrap();
        engine.handle().generate_reply(hash).await.unwrap();
        next_event(&mut events).await;

        let seen = client.seen.lock();
        assert!(seen[0][0].content.contains("playful_sarcastic"));
        drop(seen);

        engine.shutdown().await;
    }
}
