pub mod notification;
pub mod persona;
pub mod status;

pub use notification::{
    content_hash, conversation_id, CapturedNotification, EchoNotifier, IncomingNotification,
    ReplyAction,
};
pub use persona::Persona;
pub use status::{SendStatus, StatusUpdate};
