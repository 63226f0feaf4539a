//! Headless bridge for the reply pipeline.
//!
//! Reads captured notifications as NDJSON records on stdin (one
//! `IncomingNotification` per line), runs them through the listener -> engine
//! -> dispatcher pipeline, and writes delivered replies as NDJSON on stdout.
//! On-device the same roles are played by the platform notification listener
//! and the captured reply intents.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use jawaf_core::ai::GroqClient;
use jawaf_core::constants::{DEFAULT_CONTEXT_LIMIT, DEFAULT_MODEL};
use jawaf_core::{
    EchoNotifier, EngineConfig, EngineEvent, IncomingNotification, NotificationListener, Persona,
    ReplyAction, ReplyDispatcher, ReplyEngine, SharedNotificationStore,
};

#[derive(Parser)]
#[command(name = "jawaf-gateway")]
#[command(about = "Notification reply gateway: captures notifications, drafts AI replies, dispatches them")]
struct Cli {
    /// Completion model
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Own package id; notifications from it are never captured
    #[arg(long, default_value = "ai.jawaf.app")]
    own_app_id: String,

    /// Prior messages included in each reply prompt
    #[arg(long, default_value_t = DEFAULT_CONTEXT_LIMIT)]
    context_limit: usize,

    /// Path to a persona JSON file (missing fields take defaults)
    #[arg(long)]
    persona: Option<std::path::PathBuf>,
}

/// Echo notifications land in the log; there is no tray to re-post to.
struct LogEcho;

impl EchoNotifier for LogEcho {
    fn notify(&self, title: &str, summary: &str) {
        info!(title = %title, summary = %summary, "captured");
    }
}

/// Stand-in for a captured platform reply action: writes the reply as an
/// NDJSON record on stdout.
struct StdoutReplyAction {
    conversation_id: String,
}

impl ReplyAction for StdoutReplyAction {
    fn deliver(&self, text: &str) -> Result<()> {
        let record = serde_json::json!({
            "conversation_id": self.conversation_id,
            "reply": text,
        });
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", record).context("Failed to write reply record")?;
        stdout.flush().context("Failed to flush stdout")?;
        Ok(())
    }
}

/// Next value from a broadcast receiver. A lagged receiver is not a closed
/// one: skip the gap and keep receiving, reporting how many values were
/// dropped so the caller can account for them. Returns `None` only once the
/// channel is closed.
async fn recv_skip_lagged<T: Clone>(rx: &mut broadcast::Receiver<T>) -> Option<(T, u64)> {
    let mut dropped = 0;
    loop {
        match rx.recv().await {
            Ok(value) => return Some((value, dropped)),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "broadcast consumer lagged, oldest values dropped");
                dropped += n;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

fn load_persona(cli: &Cli) -> Result<Persona> {
    match &cli.persona {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read persona file {}", path.display()))?;
            serde_json::from_str(&json).context("Failed to parse persona file")
        }
        None => Ok(Persona::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let api_key = std::env::var("GROQ_API_KEY").context("GROQ_API_KEY not set")?;
    let persona = load_persona(&cli)?;

    let store = SharedNotificationStore::new();
    let listener = NotificationListener::with_echo(
        store.clone(),
        cli.own_app_id.clone(),
        Arc::new(LogEcho),
    );
    let dispatcher = Arc::new(ReplyDispatcher::new(store.clone()));

    let config = EngineConfig {
        own_app_id: cli.own_app_id.clone(),
        context_limit: cli.context_limit,
        persona,
    };
    let client = Arc::new(GroqClient::with_model(api_key, cli.model.clone()));
    let engine = ReplyEngine::spawn(config, store.clone(), client);

    // Replies still being generated or dispatched; drained before exit
    let pending = Arc::new(AtomicUsize::new(0));

    // Dispatch generated replies and report the outcome back to the engine
    let mut events = engine.subscribe();
    let event_handle = engine.handle();
    let event_dispatcher = dispatcher.clone();
    let event_pending = pending.clone();
    let event_task = tokio::spawn(async move {
        while let Some((event, dropped)) = recv_skip_lagged(&mut events).await {
            // Every engine event accounts for one in-flight reply, so events
            // lost to lag still have to drain the pending counter.
            if dropped > 0 {
                event_pending.fetch_sub(dropped as usize, Ordering::SeqCst);
            }
            match event {
                EngineEvent::ReplyGenerated {
                    hash,
                    conversation_id,
                    reply,
                } => {
                    let delivered = event_dispatcher.send_reply(&conversation_id, &reply).await;
                    if let Err(e) = &delivered {
                        error!(conversation = %conversation_id, error = %e, "dispatch failed");
                    }
                    let _ = event_handle.reply_sent(hash, delivered.is_ok()).await;
                    event_pending.fetch_sub(1, Ordering::SeqCst);
                }
                EngineEvent::ReplyFailed { hash, error } => {
                    warn!(hash = %hash, error = %error, "generation failed");
                    event_pending.fetch_sub(1, Ordering::SeqCst);
                }
            }
        }
    });

    // Log dispatch status transitions
    let mut statuses = dispatcher.subscribe();
    let status_task = tokio::spawn(async move {
        while let Some((update, _)) = recv_skip_lagged(&mut statuses).await {
            info!(
                conversation = %update.conversation_id,
                status = %update.status,
                message = update.message.as_deref().unwrap_or(""),
                "send status"
            );
        }
    });

    listener.on_connected();
    info!(model = %cli.model, "gateway ready, reading notifications from stdin");

    let handle = engine.handle();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let incoming: IncomingNotification = match serde_json::from_str(&line) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "skipping malformed notification record");
                continue;
            }
        };

        let action: Option<Arc<dyn ReplyAction>> = if incoming.can_reply {
            Some(Arc::new(StdoutReplyAction {
                conversation_id: jawaf_core::models::conversation_id(
                    &incoming.app_id,
                    incoming.group_title.as_deref(),
                    incoming.sender.as_deref(),
                    &incoming.title,
                ),
            }))
        } else {
            None
        };

        if let Some(hash) = listener.handle_posted(&incoming, action) {
            if incoming.can_reply {
                pending.fetch_add(1, Ordering::SeqCst);
                handle.generate_reply(hash).await?;
            }
        }
    }

    // Stdin closed; let in-flight replies drain before shutting down
    let drain_deadline = tokio::time::Instant::now() + Duration::from_secs(60);
    while pending.load(Ordering::SeqCst) > 0 {
        if tokio::time::Instant::now() > drain_deadline {
            warn!(
                pending = pending.load(Ordering::SeqCst),
                "giving up on in-flight replies"
            );
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    listener.on_disconnected();
    engine.shutdown().await;
    event_task.abort();
    status_task.abort();
    info!("gateway stopped");
    Ok(())
}
