mod event;
mod request;

pub use event::{ChatEvent, ToolCallRecord};
pub use request::{ChatMessage, ChatRequestBody, ChatRole};
