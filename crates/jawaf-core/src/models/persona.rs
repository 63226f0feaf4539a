use serde::{Deserialize, Serialize};

/// User communication-style preferences passed to the LLM client to bias
/// generated replies. Every field has a defined default so a freshly started
/// engine can answer before the user has configured anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Persona {
    pub communication_style: String,
    pub tone: String,
    pub response_length: String,
    pub language_preference: String,
    pub personality_type: String,
}

impl Default for Persona {
    fn default() -> Self {
        Self {
            communication_style: "casual".to_string(),
            tone: "warm_empathetic".to_string(),
            response_length: "short".to_string(),
            language_preference: "english".to_string(),
            personality_type: "friendly_helpful".to_string(),
        }
    }
}

impl Persona {
    /// Render the persona as prompt-ready lines.
    pub fn describe(&self) -> String {
        format!(
            "Communication style: {}\nTone: {}\nResponse length: {}\nLanguage preference: {}\nPersonality: {}",
            self.communication_style,
            self.tone,
            self.response_length,
            self.language_preference,
            self.personality_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_persona_has_all_fields() {
        let p = Persona::default();
        assert!(!p.communication_style.is_empty());
        assert!(!p.tone.is_empty());
        assert!(!p.response_length.is_empty());
        assert!(!p.language_preference.is_empty());
        assert!(!p.personality_type.is_empty());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let p: Persona = serde_json::from_str(r#"{"tone":"playful"}"#).unwrap();
        assert_eq!(p.tone, "playful");
        assert_eq!(p.communication_style, Persona::default().communication_style);
    }

    #[test]
    fn test_describe_mentions_tone() {
        let p = Persona {
            tone: "warm_empathetic".to_string(),
            ..Persona::default()
        };
        assert!(p.describe().contains("warm_empathetic"));
    }
}
