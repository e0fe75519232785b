use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::SpatioError;
use crate::live::event::LiveEvent;
use crate::protocol::{Frame, FrameBuffer, RespValue};

/// 实时连接的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Authenticating,
    CommandSent,
    Streaming,
    Closed,
}

/// 实时事件流解码器
///
/// 不做任何 IO：调用方把读到的字节交给 `feed`，再反复调用 `next_event`
/// 取出事件，直到返回 `None`。每个完整的帧产生零个或一个事件。
pub struct StreamDecoder<T> {
    buffer: FrameBuffer,
    state: ConnectionState,
    pending_acks: usize,
    verb: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T: DeserializeOwned> Default for StreamDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: DeserializeOwned> StreamDecoder<T> {
    pub fn new() -> Self {
        Self {
            buffer: FrameBuffer::new(),
            state: ConnectionState::Connecting,
            pending_acks: 0,
            verb: String::new(),
            _marker: PhantomData,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == ConnectionState::Closed
    }

    /// 已写出 AUTH 帧，等待它的确认
    pub fn auth_sent(&mut self) {
        if self.is_closed() {
            return;
        }
        self.state = ConnectionState::Authenticating;
        self.pending_acks += 1;
    }

    /// 已写出查询命令，等待它的确认
    pub fn command_sent(&mut self, verb: &str) {
        if self.is_closed() {
            return;
        }
        self.state = ConnectionState::CommandSent;
        self.pending_acks += 1;
        self.verb = verb.to_string();
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        if !self.is_closed() {
            self.buffer.extend(bytes);
        }
    }

    /// 关闭后丢弃所有已缓冲的字节，不再产生事件
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
        self.buffer.clear();
    }

    pub fn next_event(&mut self) -> Option<LiveEvent<T>> {
        loop {
            if self.is_closed() {
                return None;
            }

            match self.buffer.next_frame() {
                Ok(None) => return None,
                Ok(Some(Frame::Malformed(reason))) => {
                    debug!("Skipping malformed frame: {}", reason);
                    return Some(LiveEvent::Error(SpatioError::ProtocolDecode(reason)));
                }
                Ok(Some(Frame::Value(value))) => {
                    if let Some(event) = self.classify(value) {
                        return Some(event);
                    }
                }
                Err(e) => {
                    error!("Live stream corrupted, closing: {}", e);
                    self.close();
                    return Some(LiveEvent::Fatal(e));
                }
            }
        }
    }

    fn classify(&mut self, value: RespValue) -> Option<LiveEvent<T>> {
        match value {
            RespValue::SimpleString(s) if s.eq_ignore_ascii_case("OK") => {
                self.acknowledge();
                None
            }
            RespValue::Error(msg) => Some(LiveEvent::Error(SpatioError::ProtocolDecode(msg))),
            RespValue::SimpleString(s) | RespValue::BulkString(Some(s)) => self.decode_text(s),
            RespValue::Integer(n) => Some(LiveEvent::Raw(n.to_string())),
            RespValue::BulkString(None) | RespValue::Array(None) => {
                debug!("Ignoring nil frame");
                None
            }
            array @ RespValue::Array(Some(_)) => {
                let json = array.to_json();
                match serde_json::from_value::<T>(json.clone()) {
                    Ok(obj) => Some(LiveEvent::Object(obj)),
                    Err(e) => {
                        warn!("Failed to decode array frame, delivering raw: {}", e);
                        Some(LiveEvent::Raw(json.to_string()))
                    }
                }
            }
        }
    }

    fn decode_text(&mut self, text: String) -> Option<LiveEvent<T>> {
        if !(text.starts_with('{') || text.starts_with('[')) {
            return Some(LiveEvent::Raw(text));
        }

        let json: Value = match serde_json::from_str(&text) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to parse JSON frame, delivering raw: {}", e);
                return Some(LiveEvent::Raw(text));
            }
        };

        // JSON 输出模式下的确认与拒绝
        if let Some(ok) = json.get("ok").and_then(Value::as_bool) {
            if ok && json.get("live").and_then(Value::as_bool) == Some(true) {
                self.acknowledge();
                return None;
            }
            if !ok {
                let message = json
                    .get("err")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Some(LiveEvent::Error(SpatioError::ServerRejected {
                    command: self.verb.clone(),
                    message,
                }));
            }
        }

        match serde_json::from_value::<T>(json) {
            Ok(obj) => Some(LiveEvent::Object(obj)),
            Err(e) => {
                warn!("Failed to decode JSON frame, delivering raw: {}", e);
                Some(LiveEvent::Raw(text))
            }
        }
    }

    fn acknowledge(&mut self) {
        if self.pending_acks > 0 {
            self.pending_acks -= 1;
        }
        if self.pending_acks == 0 && self.state == ConnectionState::CommandSent {
            debug!("Live command acknowledged, streaming");
            self.state = ConnectionState::Streaming;
        }
    }
}
