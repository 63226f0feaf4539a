use crate::constants::TONE_WINDOW;
use crate::models::CapturedNotification;

/// Coarse conversation tone, derived from keyword patterns only. This is a
/// descriptive heuristic for prompt flavoring, not a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationTone {
    CasualFunny,
    PoliteFormal,
    Affectionate,
    Urgent,
    Professional,
    Neutral,
}

impl ConversationTone {
    /// Instruction line matching the detected tone, appended to the reply
    /// prompt's instruction block.
    pub fn style_hint(self) -> &'static str {
        match self {
            Self::CasualFunny => "The conversation is casual and joking; keep the reply light.",
            Self::PoliteFormal => "The conversation is polite and formal; stay courteous.",
            Self::Affectionate => "The conversation is affectionate; keep the reply warm.",
            Self::Urgent => "The message sounds urgent; reply directly, no filler.",
            Self::Professional => {
                "The conversation is work-related; keep the reply clear and businesslike."
            }
            Self::Neutral => "No strong tone detected; mirror the message you are replying to.",
        }
    }
}

const CASUAL_FUNNY: &[&str] = &["lol", "haha", "lmao", "hehe", "rofl", "bro", "dude", "😂", "🤣"];
const POLITE_FORMAL: &[&str] = &["please", "kindly", "thank you", "would you", "could you", "regards"];
const AFFECTIONATE: &[&str] = &["love you", "miss you", "babe", "honey", "sweetheart", "❤", "😘"];
const URGENT: &[&str] = &["urgent", "asap", "emergency", "right now", "immediately", "hurry"];
const PROFESSIONAL: &[&str] = &["meeting", "deadline", "project", "report", "invoice", "schedule"];

/// Classify the tone around a notification being replied to: the notification
/// itself plus the most recent prior messages, bounded by `TONE_WINDOW` in
/// total.
///
/// `context` is oldest-first, as `conversation_context` returns it. Keyword
/// classes are checked in a fixed order against the lowercased window text;
/// first class with any match wins, default Neutral.
pub fn reply_tone(
    notification: &CapturedNotification,
    context: &[CapturedNotification],
) -> ConversationTone {
    let window_start = (context.len() + 1).saturating_sub(TONE_WINDOW);
    let text = context[window_start..]
        .iter()
        .map(|m| m.text.as_str())
        .chain(std::iter::once(notification.text.as_str()))
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let classes: &[(&[&str], ConversationTone)] = &[
        (CASUAL_FUNNY, ConversationTone::CasualFunny),
        (POLITE_FORMAL, ConversationTone::PoliteFormal),
        (AFFECTIONATE, ConversationTone::Affectionate),
        (URGENT, ConversationTone::Urgent),
        (PROFESSIONAL, ConversationTone::Professional),
    ];

    for (keywords, tone) in classes {
        if keywords.iter().any(|k| text.contains(k)) {
            return *tone;
        }
    }

    ConversationTone::Neutral
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncomingNotification;

    fn message(text: &str) -> CapturedNotification {
        let incoming = IncomingNotification {
            title: "Sam".to_string(),
            text: text.to_string(),
            app_id: "com.whatsapp".to_string(),
            timestamp: 0,
            sender: Some("Sam".to_string()),
            group_title: None,
            can_reply: false,
        };
        CapturedNotification::from_incoming(&incoming, None)
    }

    #[test]
    fn test_lol_is_casual_funny() {
        assert_eq!(
            reply_tone(&message("lol that was great"), &[]),
            ConversationTone::CasualFunny
        );
    }

    #[test]
    fn test_no_keywords_is_neutral() {
        let context = vec![message("see you tomorrow")];
        assert_eq!(
            reply_tone(&message("ok"), &context),
            ConversationTone::Neutral
        );
    }

    #[test]
    fn test_first_matching_class_wins() {
        // Both casual and professional keywords present; casual is checked first
        assert_eq!(
            reply_tone(&message("haha the meeting ran long"), &[]),
            ConversationTone::CasualFunny
        );
    }

    #[test]
    fn test_context_contributes_to_classification() {
        let context = vec![message("the invoice is overdue")];
        assert_eq!(
            reply_tone(&message("did you see it?"), &context),
            ConversationTone::Professional
        );
    }

    #[test]
    fn test_only_last_window_considered() {
        let mut context = vec![message("lol")];
        for _ in 0..TONE_WINDOW {
            context.push(message("nothing notable here"));
        }
        // The "lol" message fell out of the window
        assert_eq!(
            reply_tone(&message("anything else"), &context),
            ConversationTone::Neutral
        );
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(
            reply_tone(&message("PLEASE send the documents"), &[]),
            ConversationTone::PoliteFormal
        );
    }

    #[test]
    fn test_every_tone_has_a_distinct_hint() {
        let tones = [
            ConversationTone::CasualFunny,
            ConversationTone::PoliteFormal,
            ConversationTone::Affectionate,
            ConversationTone::Urgent,
            ConversationTone::Professional,
            ConversationTone::Neutral,
        ];
        for (i, a) in tones.iter().enumerate() {
            for b in &tones[i + 1..] {
                assert_ne!(a.style_hint(), b.style_hint());
            }
        }
    }
}
