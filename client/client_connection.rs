use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, SpatioError};
use crate::protocol::{Command, Frame, FrameBuffer, RespValue};

/// 上一个请求进行到哪一步
///
/// 调用方可能在 `send_command` 的任意 await 点放弃 future（例如外层超时），
/// 下一次请求据此决定先丢弃旧回复，还是放弃整条连接。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlight {
    Idle,
    Writing,
    Reading,
}

/// 请求/响应连接
///
/// 每次只有一个请求在途：写出命令后一直读到一个完整的回复帧为止。
pub struct ClientConnection<S> {
    stream: S,
    buffer: FrameBuffer,
    in_flight: InFlight,
}

impl ClientConnection<TcpStream> {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self::new(stream))
    }
}

impl<S> ClientConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: FrameBuffer::new(),
            in_flight: InFlight::Idle,
        }
    }

    pub async fn send_command(&mut self, command: &Command) -> Result<RespValue> {
        let verb = command.verb();

        match self.in_flight {
            InFlight::Idle => {}
            InFlight::Reading => {
                // 上一个请求被取消，它的回复仍在路上，先读掉
                match self.read_reply(verb).await {
                    Ok(stale) => debug!("Discarded reply of cancelled request: {:?}", stale),
                    Err(e) if !e.is_fatal() => debug!("Discarded reply of cancelled request: {}", e),
                    Err(e) => return Err(e),
                }
                self.in_flight = InFlight::Idle;
            }
            InFlight::Writing => {
                return Err(SpatioError::ProtocolFatal(
                    "previous request was cancelled while being written".to_string(),
                ));
            }
        }

        self.in_flight = InFlight::Writing;
        self.stream
            .write_all(command.to_resp().as_bytes())
            .await
            .map_err(|e| transport(verb, e))?;
        self.stream.flush().await.map_err(|e| transport(verb, e))?;

        self.in_flight = InFlight::Reading;
        let reply = self.read_reply(verb).await;
        // 损坏但边界完整的回复也已经被消费
        if !matches!(reply, Err(ref e) if e.is_fatal()) {
            self.in_flight = InFlight::Idle;
        }
        reply
    }

    async fn read_reply(&mut self, verb: &str) -> Result<RespValue> {
        let mut temp = [0u8; 4096];

        loop {
            match self.buffer.next_frame()? {
                Some(Frame::Value(value)) => {
                    debug!("{} reply: {:?}", verb, value);
                    return Ok(value);
                }
                Some(Frame::Malformed(reason)) => {
                    return Err(SpatioError::ProtocolDecode(reason));
                }
                None => {}
            }

            let n = self
                .stream
                .read(&mut temp)
                .await
                .map_err(|e| transport(verb, e))?;
            if n == 0 {
                return Err(transport(
                    verb,
                    io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by server"),
                ));
            }
            self.buffer.extend(&temp[..n]);
        }
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

fn transport(verb: &str, source: io::Error) -> SpatioError {
    SpatioError::Transport {
        command: verb.to_string(),
        source,
    }
}
