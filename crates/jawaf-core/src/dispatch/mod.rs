pub mod dispatcher;

pub use dispatcher::{DispatchError, DispatchPolicy, ReplyDispatcher};
