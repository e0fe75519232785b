//! 实时地理围栏
//!
//! `StreamDecoder` 把原始字节流解码为事件，`LiveFence` 在一条独立连接上
//! 驱动它，并把事件按顺序交给一个回调。

pub mod decoder;
pub mod event;
pub mod fence;

pub use decoder::{ConnectionState, StreamDecoder};
pub use event::{GeofenceEvent, LiveEvent};
pub use fence::{FenceHandle, LiveFence};
