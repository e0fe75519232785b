pub mod client;
pub mod config;
pub mod error;
pub mod live;
pub mod protocol;
pub mod query;

// 重新导出主要的公共接口
pub use error::{Result, SpatioError};
pub use query::{ClauseKind, DetectKind, FenceCommand, OutputFormat, Query, QueryType, SortOrder};

// 重新导出常用类型，便于二进制文件使用
pub use client::{CliArgs, Client, ClientConnection, OutputFormatter};
pub use config::ClientConfig;
pub use live::{ConnectionState, FenceHandle, GeofenceEvent, LiveEvent, LiveFence, StreamDecoder};
pub use protocol::Command;
