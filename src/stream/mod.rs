//! Wire encoding of the chat event stream.

mod encoder;

pub use encoder::{EventEncoder, encode_stream};
