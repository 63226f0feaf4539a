pub mod client;
pub mod generator;
pub mod groq;
pub mod prompt;
pub mod tone;

pub use client::{ChatMessage, CompletionClient, Role};
pub use generator::{GenerateError, ReplyGenerator};
pub use groq::GroqClient;
pub use tone::{reply_tone, ConversationTone};
