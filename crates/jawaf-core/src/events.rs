use crate::models::Persona;

/// Inbound commands for the reply engine. Commands identify notifications by
/// content hash, which is unique within the store.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Generate a reply for the captured notification with this hash
    GenerateReply { hash: String },
    /// Downstream dispatch finished; mark the source entry sent on success
    ReplySent { hash: String, success: bool },
    /// Replace the process-wide persona
    UpdatePersona(Persona),
    Shutdown,
}

/// Outbound engine events, broadcast for the dispatch side and the host UI.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    ReplyGenerated {
        hash: String,
        conversation_id: String,
        reply: String,
    },
    ReplyFailed {
        hash: String,
        error: String,
    },
}
