use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::config::ClientConfig;
use crate::error::{Result, SpatioError};
use crate::live::decoder::{ConnectionState, StreamDecoder};
use crate::live::event::LiveEvent;
use crate::protocol::Command;
use crate::query::Query;

type CloseCallback = Box<dyn FnOnce() + Send + 'static>;

struct CloseSlot {
    callback: Option<CloseCallback>,
    fired: bool,
}

/// 读任务与句柄之间共享的状态
struct Shared {
    closed: AtomicBool,
    // 回调执行期间持有，close 通过它等待正在进行的投递结束
    delivery: Mutex<()>,
    // 正在执行本连接回调的线程，回调内部调用 close 时不能再等待投递锁
    delivering: Mutex<Option<ThreadId>>,
    on_close: Mutex<CloseSlot>,
    state: Mutex<ConnectionState>,
    shutdown: Notify,
    finished: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 回调返回或 panic 时清除 `delivering`
struct DeliveringGuard<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for DeliveringGuard<'_> {
    fn drop(&mut self) {
        *lock(self.0) = None;
    }
}

/// 读任务结束时（包括回调 panic 导致的 unwind）触发关闭流程
struct FinishOnDrop(Arc<Shared>);

impl Drop for FinishOnDrop {
    fn drop(&mut self) {
        self.0.finish();
    }
}

impl Shared {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            delivery: Mutex::new(()),
            delivering: Mutex::new(None),
            on_close: Mutex::new(CloseSlot {
                callback: None,
                fired: false,
            }),
            state: Mutex::new(ConnectionState::Connecting),
            shutdown: Notify::new(),
            finished: Notify::new(),
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let mut current = lock(&self.state);
        if *current != ConnectionState::Closed {
            *current = state;
        }
    }

    /// 投递一个事件，连接已关闭时返回 false
    fn deliver<T, F>(&self, on_event: &mut F, event: LiveEvent<T>) -> bool
    where
        F: FnMut(LiveEvent<T>),
    {
        let _delivery = lock(&self.delivery);
        if self.closed.load(Ordering::Acquire) {
            return false;
        }

        *lock(&self.delivering) = Some(thread::current().id());
        let _delivering = DeliveringGuard(&self.delivering);
        on_event(event);
        true
    }

    /// 当前线程是否正在执行本连接的回调
    fn in_own_callback(&self) -> bool {
        *lock(&self.delivering) == Some(thread::current().id())
    }

    /// 返回 true 表示本次调用真正触发了关闭
    fn request_close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        // 等待另一线程上正在执行的回调结束，之后不会再有投递
        if !self.in_own_callback() {
            drop(lock(&self.delivery));
        }

        self.set_state(ConnectionState::Closed);
        self.shutdown.notify_one();
        true
    }

    fn finish(&self) {
        self.closed.store(true, Ordering::Release);
        *lock(&self.state) = ConnectionState::Closed;

        let callback = {
            let mut slot = lock(&self.on_close);
            slot.fired = true;
            slot.callback.take()
        };
        self.finished.notify_waiters();

        if let Some(callback) = callback {
            callback();
        }
    }

    fn is_finished(&self) -> bool {
        lock(&self.on_close).fired
    }
}

/// 实时围栏连接的句柄
///
/// 可以克隆，所有克隆共享同一条连接。丢弃句柄不会关闭连接。
#[derive(Clone)]
pub struct FenceHandle {
    shared: Arc<Shared>,
}

impl FenceHandle {
    /// 关闭连接
    ///
    /// 任何状态下都可以调用，重复调用无副作用。返回后不会再投递事件，
    /// 即使缓冲区里还有完整的帧。可以在事件回调内部调用。
    pub fn close(&self) {
        if self.shared.request_close() {
            info!("Closing live fence");
        }
    }

    /// 注册连接关闭时的回调
    ///
    /// 只有一个槽位，后注册的会替换先注册的。连接已经关闭时立即执行。
    pub fn on_close<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = lock(&self.shared.on_close);
        if slot.fired {
            drop(slot);
            callback();
            return;
        }
        slot.callback = Some(Box::new(callback));
    }

    pub fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }

    pub fn is_closed(&self) -> bool {
        self.state() == ConnectionState::Closed
    }

    /// 等待读任务结束并释放连接
    pub async fn wait(&self) {
        loop {
            let notified = self.shared.finished.notified();
            if self.shared.is_finished() {
                return;
            }
            notified.await;
        }
    }
}

/// 打开实时围栏连接
pub struct LiveFence;

impl LiveFence {
    /// 通过 TCP 连接服务端，查询会被强制加上 FENCE 子句
    pub async fn connect<T, F>(
        config: &ClientConfig,
        query: &Query,
        on_event: F,
    ) -> Result<FenceHandle>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(LiveEvent<T>) + Send + 'static,
    {
        let command = query.clone().fence().render();
        Self::connect_command(config, &command, on_event).await
    }

    /// 发送任意一条流式命令，例如命令行里手写的 `NEARBY fleet FENCE ...`
    pub async fn connect_command<T, F>(
        config: &ClientConfig,
        command: &Command,
        on_event: F,
    ) -> Result<FenceHandle>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnMut(LiveEvent<T>) + Send + 'static,
    {
        let addr = config.connection.address();
        info!("Opening live fence to {}", addr);

        let stream = TcpStream::connect(&addr).await?;
        stream.set_nodelay(true)?;
        Self::open(stream, config.connection.password.as_deref(), command, on_event).await
    }

    /// 在已建立的连接上完成握手，并启动读任务
    ///
    /// 写出 AUTH（如果配置了密码）和命令后立即返回，事件在后台任务中按顺序投递。
    pub async fn open<S, T, F>(
        mut stream: S,
        password: Option<&str>,
        command: &Command,
        on_event: F,
    ) -> Result<FenceHandle>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        T: DeserializeOwned + Send + 'static,
        F: FnMut(LiveEvent<T>) + Send + 'static,
    {
        let shared = Arc::new(Shared::new());
        let mut decoder = StreamDecoder::<T>::new();

        if let Some(password) = password {
            decoder.auth_sent();
            shared.set_state(decoder.state());
            let auth = Command::new("AUTH").arg(password);
            write_frame(&mut stream, &auth, "AUTH").await?;
        }

        write_frame(&mut stream, command, command.verb()).await?;
        decoder.command_sent(command.verb());
        shared.set_state(decoder.state());
        debug!("Sent live command: {}", command);

        tokio::spawn(read_loop(stream, decoder, Arc::clone(&shared), on_event));

        Ok(FenceHandle { shared })
    }
}

async fn write_frame<S>(stream: &mut S, command: &Command, verb: &str) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let transport = |source| SpatioError::Transport {
        command: verb.to_string(),
        source,
    };
    stream
        .write_all(command.to_inline().as_bytes())
        .await
        .map_err(transport)?;
    stream.flush().await.map_err(transport)?;
    Ok(())
}

async fn read_loop<S, T, F>(
    stream: S,
    mut decoder: StreamDecoder<T>,
    shared: Arc<Shared>,
    mut on_event: F,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: DeserializeOwned + Send + 'static,
    F: FnMut(LiveEvent<T>) + Send + 'static,
{
    // 先于 stream 声明，drop 时连接先释放，再触发 on_close
    let _finish = FinishOnDrop(Arc::clone(&shared));
    let mut stream = stream;
    let mut chunk = vec![0u8; 4096];

    'read: loop {
        tokio::select! {
            _ = shared.shutdown.notified() => {
                debug!("Live fence closed locally");
                break;
            }
            read = stream.read(&mut chunk) => match read {
                Ok(0) => {
                    info!("Live fence closed by server");
                    break;
                }
                Ok(n) => {
                    decoder.feed(&chunk[..n]);
                    while let Some(event) = decoder.next_event() {
                        shared.set_state(decoder.state());
                        if !shared.deliver(&mut on_event, event) {
                            break 'read;
                        }
                    }
                    if decoder.is_closed() {
                        break;
                    }
                    shared.set_state(decoder.state());
                }
                Err(e) => {
                    error!("Live fence read failed: {}", e);
                    shared.deliver(&mut on_event, LiveEvent::Fatal(SpatioError::Io(e)));
                    break;
                }
            }
        }
    }

    decoder.close();
    if let Err(e) = stream.shutdown().await {
        debug!("Live fence shutdown: {}", e);
    }
    drop(stream);
}
