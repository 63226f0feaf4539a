pub mod ai;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod engine;
pub mod events;
pub mod listener;
pub mod models;
pub mod store;

// Re-export the pipeline surface at crate root for convenience
pub use config::EngineConfig;
pub use dispatch::{DispatchError, DispatchPolicy, ReplyDispatcher};
pub use engine::{EngineHandle, ReplyEngine};
pub use events::{EngineCommand, EngineEvent};
pub use listener::NotificationListener;
pub use models::{
    CapturedNotification, EchoNotifier, IncomingNotification, Persona, ReplyAction, SendStatus,
    StatusUpdate,
};
pub use store::SharedNotificationStore;
