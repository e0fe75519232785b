use crate::error::Result;
use crate::protocol::parser::{Frame, RespParser};

/// 累积 socket 读到的字节，按帧切分
///
/// 帧不保证与读缓冲区边界对齐，不完整的帧会留在缓冲区里等待后续数据。
pub struct FrameBuffer {
    buffer: Vec<u8>,
    // 已经被解析掉的前缀长度，延迟压缩
    consumed: usize,
    parser: RespParser,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            consumed: 0,
            parser: RespParser::new(),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// 取出下一个完整的帧
    ///
    /// 返回 `Err` 时缓冲区里的数据已不可信，调用方应当放弃这条连接。
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        let pending = &self.buffer[self.consumed..];
        match self.parser.parse_frame(pending)? {
            Some((frame, used)) => {
                self.consumed += used;
                self.compact();
                Ok(Some(frame))
            }
            None => {
                self.compact();
                Ok(None)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len() - self.consumed
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.consumed = 0;
    }

    fn compact(&mut self) {
        if self.consumed == self.buffer.len() {
            self.clear();
        } else if self.consumed > 4096 && self.consumed * 2 > self.buffer.len() {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
    }
}
