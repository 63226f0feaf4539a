use chrono::{Local, TimeZone};

use super::client::ChatMessage;
use super::tone::reply_tone;
use crate::models::{CapturedNotification, Persona};

/// Fixed package -> display name table for the platforms the prompt names.
/// Unknown packages fall back to the raw package id.
const APP_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("com.whatsapp", "WhatsApp"),
    ("com.whatsapp.w4b", "WhatsApp Business"),
    ("org.telegram.messenger", "Telegram"),
    ("com.instagram.android", "Instagram"),
    ("com.facebook.orca", "Messenger"),
    ("com.facebook.katana", "Facebook"),
    ("com.viber.voip", "Viber"),
    ("com.snapchat.android", "Snapchat"),
    ("com.imo.android.imoim", "imo"),
    ("jp.naver.line.android", "LINE"),
    ("com.google.android.apps.messaging", "Messages"),
];

/// One stylistic hint per app, appended to the instruction block.
const APP_STYLE_HINTS: &[(&str, &str)] = &[
    (
        "com.whatsapp",
        "Keep it conversational, the way friends text on WhatsApp.",
    ),
    (
        "org.telegram.messenger",
        "Direct and relaxed; Telegram chats read fine a little longer.",
    ),
    (
        "com.instagram.android",
        "Casual and expressive; light emoji use fits Instagram DMs.",
    ),
    (
        "com.facebook.orca",
        "Friendly and quick, like a Messenger thread.",
    ),
    (
        "com.snapchat.android",
        "Very short and playful; Snapchat replies are a line at most.",
    ),
];

const DEFAULT_STYLE_HINT: &str = "Match the tone and energy of the conversation.";

/// Fixed reply-style instructions embedded in every prompt.
const REPLY_INSTRUCTIONS: &[&str] = &[
    "Write a reply the user could send as-is.",
    "Sound like a real person, not an assistant.",
    "Match the length and formality of the conversation.",
    "Do not add greetings or sign-offs unless the conversation uses them.",
    "Never mention that the reply was generated.",
    "Output only the reply text, nothing else.",
];

pub fn app_display_name(app_id: &str) -> &str {
    APP_DISPLAY_NAMES
        .iter()
        .find(|(pkg, _)| *pkg == app_id)
        .map(|(_, name)| *name)
        .unwrap_or(app_id)
}

pub fn app_style_hint(app_id: &str) -> &str {
    APP_STYLE_HINTS
        .iter()
        .find(|(pkg, _)| *pkg == app_id)
        .map(|(_, hint)| *hint)
        .unwrap_or(DEFAULT_STYLE_HINT)
}

/// Format a platform epoch-millis timestamp as HH:mm local time.
pub fn format_time(timestamp_millis: u64) -> String {
    match Local.timestamp_millis_opt(timestamp_millis as i64).single() {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// Render the structured natural-language prompt for one notification plus its
/// conversation transcript.
pub fn build_prompt(
    notification: &CapturedNotification,
    context: &[CapturedNotification],
    persona: &Persona,
) -> String {
    let sender = notification
        .sender
        .as_deref()
        .unwrap_or(&notification.title);

    let mut prompt = String::new();
    prompt.push_str("You are drafting a reply the user will send from their own account.\n\n");

    prompt.push_str(&format!(
        "Platform: {}\n",
        app_display_name(&notification.app_id)
    ));
    if notification.is_group_chat() {
        if let Some(group) = &notification.group_title {
            prompt.push_str(&format!("Group chat: {}\n", group));
        }
    }
    prompt.push_str(&format!("From: {}\n", sender));
    prompt.push_str(&format!(
        "Received at: {}\n",
        format_time(notification.timestamp)
    ));

    if !context.is_empty() {
        prompt.push_str("\nConversation so far (oldest first):\n");
        for entry in context {
            let who = entry.sender.as_deref().unwrap_or(&entry.title);
            prompt.push_str(&format!("- {}: {}\n", who, entry.text));
            if !entry.ai_reply.is_empty() {
                prompt.push_str(&format!("- You: {}\n", entry.ai_reply));
            }
        }
    }

    prompt.push_str(&format!("\nMessage to reply to:\n{}: {}\n", sender, notification.text));

    prompt.push_str("\nAbout the user:\n");
    prompt.push_str(&persona.describe());
    prompt.push('\n');

    prompt.push_str("\nInstructions:\n");
    for instruction in REPLY_INSTRUCTIONS {
        prompt.push_str(&format!("- {}\n", instruction));
    }
    prompt.push_str(&format!("- {}\n", app_style_hint(&notification.app_id)));
    prompt.push_str(&format!(
        "- {}\n",
        reply_tone(notification, context).style_hint()
    ));

    prompt
}

/// Build the role-tagged message list for the LLM client: a leading system
/// message, prior inbound messages as `user`, previously generated replies as
/// `assistant`, and the rendered prompt as the final `user` turn.
pub fn build_messages(
    notification: &CapturedNotification,
    context: &[CapturedNotification],
    persona: &Persona,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(context.len() * 2 + 2);

    messages.push(ChatMessage::system(format!(
        "You draft short chat replies on the user's behalf.\n{}",
        persona.describe()
    )));

    for entry in context {
        let who = entry.sender.as_deref().unwrap_or(&entry.title);
        messages.push(ChatMessage::user(format!("{}: {}", who, entry.text)));
        if !entry.ai_reply.is_empty() {
            messages.push(ChatMessage::assistant(entry.ai_reply.clone()));
        }
    }

    messages.push(ChatMessage::user(build_prompt(notification, context, persona)));
    messages
}
