pub mod command;
pub mod encoder;
pub mod frame_buffer;
pub mod parser;

pub use command::Command;
pub use encoder::RespEncoder;
pub use frame_buffer::FrameBuffer;
pub use parser::{Frame, RespParser, RespValue};
