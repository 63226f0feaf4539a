use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-conversation dispatch state: idle -> sending -> {sent | retrying -> sending | failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendStatus {
    Idle,
    Sending,
    Sent,
    Retrying,
    Failed,
}

impl fmt::Display for SendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SendStatus::Idle => "idle",
            SendStatus::Sending => "sending",
            SendStatus::Sent => "sent",
            SendStatus::Retrying => "retrying",
            SendStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// In-process status broadcast, consumed by whatever UI the host runs.
/// Not persisted anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub conversation_id: String,
    pub status: SendStatus,
    pub message: Option<String>,
    /// Epoch millis at the time of the transition
    pub timestamp: u64,
}

impl StatusUpdate {
    pub fn new(conversation_id: &str, status: SendStatus, message: Option<String>) -> Self {
        Self {
            conversation_id: conversation_id.to_string(),
            status,
            message,
            timestamp: now_millis(),
        }
    }
}

pub(crate) fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&SendStatus::Retrying).unwrap(),
            "\"retrying\""
        );
    }

    #[test]
    fn test_display_matches_serde() {
        for status in [
            SendStatus::Idle,
            SendStatus::Sending,
            SendStatus::Sent,
            SendStatus::Retrying,
            SendStatus::Failed,
        ] {
            let display = status.to_string();
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", display));
        }
    }
}
