//! Application-wide constants
//!
//! Centralized location for magic numbers and configuration defaults that are
//! used across multiple modules.

use std::time::Duration;

/// Groq OpenAI-compatible API base
pub const GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";

/// Default completion model
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Maximum captured notifications retained in memory. Inserting past this
/// evicts the oldest entry and forgets its hash.
pub const MAX_STORED_NOTIFICATIONS: usize = 500;

/// Prior same-conversation messages included in the reply prompt
pub const DEFAULT_CONTEXT_LIMIT: usize = 10;

/// Messages considered by the tone classifier
pub const TONE_WINDOW: usize = 5;

// Dispatch defaults. The retry delay is a deliberate constant, not a backoff
// curve; delivery has no real acknowledgment so the confirm delay is best-effort.
pub const MAX_SEND_ATTEMPTS: u32 = 3;
pub const SEND_RETRY_DELAY: Duration = Duration::from_secs(2);
pub const SEND_CONFIRM_DELAY: Duration = Duration::from_secs(1);

/// Timeout applied to every LLM HTTP call
pub const LLM_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine command channel depth
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Status/event broadcast channel depth
pub const BROADCAST_CHANNEL_CAPACITY: usize = 128;
