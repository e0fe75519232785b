//! 错误类型
//!
//! 所有模块共用一个错误枚举，区分：
//! - 参数错误（构建查询时立即拒绝）
//! - 可恢复的协议错误（单个帧损坏，流继续）
//! - 致命协议错误（帧边界丢失，连接必须关闭）
//! - 传输错误与服务端拒绝（只影响触发它的那条命令）

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpatioError {
    /// 子句参数不合法，例如 SPARSE 超出 1..=8
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 单个回复帧无法解码，连接保持打开
    #[error("protocol decode error: {0}")]
    ProtocolDecode(String),

    /// 帧结构损坏，无法再找到下一帧的边界
    #[error("fatal protocol error: {0}")]
    ProtocolFatal(String),

    /// 执行某条命令时底层连接失败
    #[error("{command} failed: {source}")]
    Transport {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// 服务端返回 ok:false 或 -ERR
    #[error("{command} rejected by server: {message}")]
    ServerRejected { command: String, message: String },

    /// 握手失败，连接永远不会就绪
    #[error("connection not ready: {0}")]
    NotReady(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl SpatioError {
    /// 是否需要拆除连接
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SpatioError::ProtocolFatal(_) | SpatioError::Io(_) | SpatioError::Transport { .. }
        )
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SpatioError::InvalidArgument(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, SpatioError>;
