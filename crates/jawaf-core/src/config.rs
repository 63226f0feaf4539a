use crate::constants::DEFAULT_CONTEXT_LIMIT;
use crate::models::Persona;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// The host app's own package id; its notifications are never captured
    pub own_app_id: String,
    /// Prior same-conversation messages included in each reply prompt
    pub context_limit: usize,
    /// Initial persona; replaceable at runtime via the engine handle
    pub persona: Persona,
}

impl EngineConfig {
    pub fn new(own_app_id: impl Into<String>) -> Self {
        Self {
            own_app_id: own_app_id.into(),
            context_limit: DEFAULT_CONTEXT_LIMIT,
            persona: Persona::default(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("ai.jawaf.app")
    }
}
