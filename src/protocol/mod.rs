mod codec;
mod message;

pub use codec::{MAX_FRAME_LENGTH, MessageCodec};
pub use message::{Message, MessageType};
