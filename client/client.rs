use std::future::Future;
use std::sync::Arc;

use geojson::GeoJson;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::client::client_connection::ClientConnection;
use crate::config::ClientConfig;
use crate::error::{Result, SpatioError};
use crate::live::{FenceHandle, LiveEvent, LiveFence};
use crate::protocol::{Command, RespValue};
use crate::query::Query;

/// 握手进度
#[derive(Debug, Clone, PartialEq, Eq)]
enum Readiness {
    Pending,
    Ready,
    Failed(String),
}

/// 请求/响应客户端
///
/// 构造后立即返回，握手（AUTH、`OUTPUT json`）在后台完成。
/// 握手完成前发出的命令会挂起等待，而不是被丢弃。
/// 同一连接上的请求串行执行。
pub struct Client<S = TcpStream> {
    config: ClientConfig,
    ready: watch::Receiver<Readiness>,
    connection: Arc<Mutex<Option<ClientConnection<S>>>>,
}

impl<S> Clone for Client<S> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            ready: self.ready.clone(),
            connection: Arc::clone(&self.connection),
        }
    }
}

impl Client<TcpStream> {
    /// 连接到配置中的服务端，需要在 tokio 运行时中调用
    pub fn connect(config: &ClientConfig) -> Self {
        let addr = config.connection.address();
        info!("Connecting to {}", addr);
        Self::start(config, async move { ClientConnection::connect(&addr).await })
    }

    /// 在独立连接上打开实时围栏，查询会被强制加上 FENCE
    pub async fn live<T, F>(&self, query: &Query, on_event: F) -> Result<FenceHandle>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(LiveEvent<T>) + Send + 'static,
    {
        LiveFence::connect(&self.config, query, on_event).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// 在已建立的连接上创建客户端
    pub fn from_stream(stream: S, config: &ClientConfig) -> Self {
        Self::start(config, async move { Ok(ClientConnection::new(stream)) })
    }

    fn start<F>(config: &ClientConfig, connect: F) -> Self
    where
        F: Future<Output = Result<ClientConnection<S>>> + Send + 'static,
    {
        let (tx, rx) = watch::channel(Readiness::Pending);
        let connection = Arc::new(Mutex::new(None));
        let password = config.connection.password.clone();

        let slot = Arc::clone(&connection);
        tokio::spawn(async move {
            let result = match connect.await {
                Ok(conn) => handshake(conn, password).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(conn) => {
                    *slot.lock().await = Some(conn);
                    info!("Connection ready");
                    let _ = tx.send(Readiness::Ready);
                }
                Err(e) => {
                    error!("Handshake failed: {}", e);
                    let _ = tx.send(Readiness::Failed(e.to_string()));
                }
            }
        });

        Self {
            config: config.clone(),
            ready: rx,
            connection,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        *self.ready.borrow() == Readiness::Ready
    }

    /// 等待握手完成
    pub async fn wait_ready(&self) -> Result<()> {
        let mut ready = self.ready.clone();
        let state = ready
            .wait_for(|state| *state != Readiness::Pending)
            .await
            .map(|state| state.clone())
            .map_err(|_| SpatioError::NotReady("handshake task ended unexpectedly".to_string()))?;

        match state {
            Readiness::Failed(reason) => Err(SpatioError::NotReady(reason)),
            _ => Ok(()),
        }
    }

    /// 执行一条命令并返回解析后的 JSON 回复
    ///
    /// 可以被取消（例如外层超时）：下一条命令会先读掉迟到的回复。
    /// 如果取消发生在写出命令途中，连接会被丢弃。
    pub async fn execute(&self, command: &Command) -> Result<Value> {
        self.wait_ready().await?;

        let mut guard = self.connection.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| SpatioError::NotReady("connection lost".to_string()))?;

        debug!("Executing: {}", command);
        match conn.send_command(command).await {
            Ok(reply) => interpret_reply(command.verb(), reply),
            Err(e) => {
                if e.is_fatal() {
                    warn!("Dropping connection after {}", e);
                    *guard = None;
                }
                Err(e)
            }
        }
    }

    pub async fn execute_as<T: DeserializeOwned>(&self, command: &Command) -> Result<T> {
        let value = self.execute(command).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// 执行一次性查询，围栏查询需要使用 `live`
    pub async fn execute_query(&self, query: &Query) -> Result<Value> {
        if query.is_fence() {
            return Err(SpatioError::invalid(
                "fence queries stream events; open them with live()",
            ));
        }
        self.execute(&query.render()).await
    }

    pub async fn ping(&self) -> Result<Value> {
        self.execute(&Command::new("PING")).await
    }

    pub async fn set_object(
        &self,
        key: &str,
        id: &str,
        geojson: impl Into<GeoJson>,
    ) -> Result<Value> {
        let command = Command::new("SET")
            .arg(key)
            .arg(id)
            .arg("OBJECT")
            .arg(geojson.into().to_string());
        self.execute(&command).await
    }

    pub async fn set_point(&self, key: &str, id: &str, lat: f64, lon: f64) -> Result<Value> {
        let command = Command::new("SET")
            .arg(key)
            .arg(id)
            .arg("POINT")
            .arg(lat.to_string())
            .arg(lon.to_string());
        self.execute(&command).await
    }

    pub async fn get(&self, key: &str, id: &str) -> Result<Value> {
        self.execute(&Command::new("GET").arg(key).arg(id)).await
    }

    pub async fn del(&self, key: &str, id: &str) -> Result<Value> {
        self.execute(&Command::new("DEL").arg(key).arg(id)).await
    }

    pub async fn drop_collection(&self, key: &str) -> Result<Value> {
        self.execute(&Command::new("DROP").arg(key)).await
    }

    /// 关闭连接，之后的命令返回 NotReady
    pub async fn close(&self) -> Result<()> {
        if let Some(mut conn) = self.connection.lock().await.take() {
            conn.shutdown().await?;
            info!("Connection closed");
        }
        Ok(())
    }
}

async fn handshake<S>(
    mut conn: ClientConnection<S>,
    password: Option<String>,
) -> Result<ClientConnection<S>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(password) = password {
        let reply = conn.send_command(&Command::new("AUTH").arg(password)).await?;
        interpret_reply("AUTH", reply)?;
    }

    let reply = conn
        .send_command(&Command::new("OUTPUT").arg("json"))
        .await?;
    interpret_reply("OUTPUT", reply)?;
    Ok(conn)
}

/// 解析回复，`-ERR` 或 `ok:false` 视为服务端拒绝
fn interpret_reply(verb: &str, reply: RespValue) -> Result<Value> {
    let rejected = |message: String| SpatioError::ServerRejected {
        command: verb.to_string(),
        message,
    };

    match reply {
        RespValue::Error(message) => Err(rejected(message)),
        RespValue::SimpleString(text) | RespValue::BulkString(Some(text)) => {
            let value = match serde_json::from_str::<Value>(&text) {
                Ok(value) => value,
                Err(_) => return Ok(Value::String(text)),
            };

            if value.get("ok").and_then(Value::as_bool) == Some(false) {
                let message = value
                    .get("err")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown error")
                    .to_string();
                return Err(rejected(message));
            }
            Ok(value)
        }
        other => Ok(other.to_json()),
    }
}
