mod error;
mod messages_request;
mod stream_event;

pub use error::{AnthropicErrorBody, AnthropicErrorObject};
pub use messages_request::{ContentBlock, MessageParam, MessageRole, MessagesRequest, ToolSpec};
pub use stream_event::{BlockDelta, BlockStart, MessageDeltaBody, StreamEvent};
